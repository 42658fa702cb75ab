//! Step outcomes and lazily-rendered failure reasons.
//!
//! A step reports exactly one [`Outcome`] per execution: success with the
//! next running value, pending with a reason, or a fatal failure. Reasons
//! are carried as [`Reason`] templates (literal fragments plus interpolation
//! values) and only rendered to a `String` when a failure actually reaches
//! the caller, so the happy path never pays for message formatting.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::subject::Subject;
use crate::value::Value;

/// Error object raised by a step, shared so outcomes stay cheaply cloneable.
pub type StepError = Arc<dyn std::error::Error + Send + Sync>;

/// Format a duration the way failure messages and descriptions phrase it:
/// trimmed decimal seconds ("2.5", "0.3", "30").
#[must_use]
pub fn format_seconds(duration: Duration) -> String {
    format!("{}", duration.as_millis() as f64 / 1000.0)
}

// ============================================================================
// Reason templates
// ============================================================================

/// One piece of a [`Reason`] template.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasonFragment {
    /// Literal message text.
    Text(Cow<'static, str>),
    /// An interpolated result count.
    Count(usize),
    /// An interpolated duration, rendered as trimmed decimal seconds.
    Seconds(Duration),
    /// An interpolated caller-supplied value.
    Value(String),
}

impl fmt::Display for ReasonFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Count(count) => write!(f, "{count}"),
            Self::Seconds(duration) => f.write_str(&format_seconds(*duration)),
            Self::Value(value) => f.write_str(value),
        }
    }
}

/// A failure reason carried as fragments and rendered on demand.
///
/// Built fluently:
///
/// ```
/// use esperar::Reason;
/// use std::time::Duration;
///
/// let reason = Reason::new()
///     .text("the delay of ")
///     .seconds(Duration::from_millis(2500))
///     .text(" seconds has not yet elapsed");
/// assert_eq!(reason.render(), "the delay of 2.5 seconds has not yet elapsed");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reason {
    fragments: Vec<ReasonFragment>,
}

impl Reason {
    /// An empty reason.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal text.
    #[must_use]
    pub fn text(mut self, text: impl Into<Cow<'static, str>>) -> Self {
        self.fragments.push(ReasonFragment::Text(text.into()));
        self
    }

    /// Append a result count.
    #[must_use]
    pub fn count(mut self, count: usize) -> Self {
        self.fragments.push(ReasonFragment::Count(count));
        self
    }

    /// Append a duration, rendered as trimmed decimal seconds.
    #[must_use]
    pub fn seconds(mut self, duration: Duration) -> Self {
        self.fragments.push(ReasonFragment::Seconds(duration));
        self
    }

    /// Append an arbitrary display value.
    #[must_use]
    pub fn value(mut self, value: impl fmt::Display) -> Self {
        self.fragments.push(ReasonFragment::Value(value.to_string()));
        self
    }

    /// Render the template to its message text.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Whether the template carries no fragments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            write!(f, "{fragment}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// What a fatal failure carries: a composed reason or a step's error object.
#[derive(Debug, Clone)]
pub enum Failure {
    /// A composed message template.
    Reason(Reason),
    /// An error object raised by a step.
    Error(StepError),
}

impl Failure {
    /// Render the failure to its message text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Reason(reason) => reason.render(),
            Self::Error(error) => error.to_string(),
        }
    }

    /// The underlying step error object, if this failure carries one.
    #[must_use]
    pub fn error(&self) -> Option<&StepError> {
        match self {
            Self::Reason(_) => None,
            Self::Error(error) => Some(error),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reason(reason) => reason.fmt(f),
            Self::Error(error) => error.fmt(f),
        }
    }
}

/// Result of one step execution.
#[derive(Debug, Clone)]
pub enum Outcome<S: Subject> {
    /// The step is satisfied; the carried value feeds the next step.
    Success(Value<S>),
    /// Not yet satisfied; the execution retries on the next change signal or
    /// deadline, bounded by the step's node timeout.
    Pending(Reason),
    /// Permanently failed; the execution rejects immediately, ignoring any
    /// remaining deadlines.
    FatalFailure(Failure),
}

impl<S: Subject> Outcome<S> {
    /// Success with the next running value.
    pub fn success(value: impl Into<Value<S>>) -> Self {
        Self::Success(value.into())
    }

    /// Not yet satisfied, with a reason template.
    pub fn pending(reason: Reason) -> Self {
        Self::Pending(reason)
    }

    /// Permanent failure with a reason template.
    pub fn fatal(reason: Reason) -> Self {
        Self::FatalFailure(Failure::Reason(reason))
    }

    /// Permanent failure carrying a step's error object. This is the error
    /// channel for steps: anything a step cannot express as a reason template
    /// is reported here, never by panicking.
    pub fn fatal_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::FatalFailure(Failure::Error(Arc::new(error)))
    }

    /// Whether this outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether this outcome is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Whether this outcome is a fatal failure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalFailure(_))
    }
}
