//! Tree-agnostic built-in steps.
//!
//! These cover everything a chain needs that does not touch the observed
//! tree: seeding the running value ([`TargetStep`]), cardinality checks
//! ([`AmountStep`], including the default check the chain injects), elapsed
//! time ([`DelayStep`]), pass-through markers ([`NoopStep`]), caller-supplied
//! filters ([`FilterStep`]) and list narrowing ([`FirstStep`]). Steps that
//! query a tree implement [`Step`] in the embedder's binding crate.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::outcome::{format_seconds, Failure, Outcome, Reason, StepError};
use crate::step::{Step, StepMeta};
use crate::subject::Subject;
use crate::value::Value;

const LEFT_QUOTE: char = '\u{201c}';
const RIGHT_QUOTE: char = '\u{201d}';
const HORIZONTAL_ELLIPSIS: char = '\u{2026}';
const LABEL_MAX_LENGTH: usize = 64;

/// Truncate a caller-supplied label for use in a description: at most 64
/// characters, with a trailing ellipsis when cut.
#[must_use]
pub fn describe_label(label: &str) -> String {
    let length = label.chars().count();
    if length <= LABEL_MAX_LENGTH {
        return label.to_owned();
    }
    let mut truncated: String = label.chars().take(LABEL_MAX_LENGTH - 1).collect();
    truncated.push(HORIZONTAL_ELLIPSIS);
    truncated
}

// ============================================================================
// Target
// ============================================================================

/// Seeds the running value, discarding whatever came before.
///
/// A fixed target always succeeds; a provider target re-resolves on every
/// check and fails the whole execution fatally when the provider reports an
/// error (the target is the one thing a wait cannot recover from).
pub struct TargetStep<S: Subject> {
    source: TargetSource<S>,
}

enum TargetSource<S: Subject> {
    Fixed(Value<S>),
    Provider {
        label: String,
        provider: Arc<dyn Fn() -> Result<Value<S>, StepError> + Send + Sync>,
    },
}

impl<S: Subject> TargetStep<S> {
    /// A target fixed at construction.
    pub fn fixed(value: impl Into<Value<S>>) -> Self {
        Self {
            source: TargetSource::Fixed(value.into()),
        }
    }

    /// A target resolved by a callback on every check. `label` names the
    /// callback in descriptions.
    pub fn provider(
        label: impl Into<String>,
        provider: impl Fn() -> Result<Value<S>, StepError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: TargetSource::Provider {
                label: label.into(),
                provider: Arc::new(provider),
            },
        }
    }
}

impl<S: Subject> Step<S> for TargetStep<S> {
    fn execute(&self, _current: &Value<S>, _meta: &StepMeta) -> Outcome<S> {
        match &self.source {
            TargetSource::Fixed(value) => Outcome::Success(value.clone()),
            TargetSource::Provider { provider, .. } => match provider() {
                Ok(value) => Outcome::Success(value),
                Err(error) => Outcome::FatalFailure(Failure::Error(error)),
            },
        }
    }

    fn describe(&self, _timeout: Duration) -> String {
        match &self.source {
            TargetSource::Fixed(Value::None) => "sets the target to none".to_owned(),
            TargetSource::Fixed(Value::One(subject)) => {
                format!("sets the target to {subject:?}")
            }
            TargetSource::Fixed(Value::Many(list)) => {
                let mut described = Vec::new();
                for subject in list.iter() {
                    if described.len() >= 5 {
                        described.push(HORIZONTAL_ELLIPSIS.to_string());
                        break;
                    }
                    described.push(format!("{subject:?}"));
                }
                format!("sets the target to [{}]", described.join(", "))
            }
            TargetSource::Provider { label, .. } => {
                format!("sets the target using a callback: `{}`", describe_label(label))
            }
        }
    }
}

impl<S: Subject> fmt::Debug for TargetStep<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            TargetSource::Fixed(value) => f.debug_tuple("TargetStep").field(value).finish(),
            TargetSource::Provider { label, .. } => f
                .debug_struct("TargetStep")
                .field("label", label)
                .finish_non_exhaustive(),
        }
    }
}

// ============================================================================
// Amount
// ============================================================================

/// Checks the cardinality of the running value.
///
/// The one step kind that satisfies a chain's default-amount requirement:
/// [`Step::applies_amount_check`] is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountStep {
    minimum: usize,
    maximum: Option<usize>,
}

impl AmountStep {
    /// Requires exactly `count` results.
    #[must_use]
    pub fn exactly(count: usize) -> Self {
        Self {
            minimum: count,
            maximum: Some(count),
        }
    }

    /// Requires at least `minimum` results, unbounded above.
    #[must_use]
    pub fn at_least(minimum: usize) -> Self {
        Self {
            minimum,
            maximum: None,
        }
    }

    /// Requires between `minimum` and `maximum` results, inclusive.
    ///
    /// # Panics
    /// Panics if `minimum > maximum`.
    #[must_use]
    pub fn between(minimum: usize, maximum: usize) -> Self {
        assert!(
            minimum <= maximum,
            "amount: maximum must be greater than or equal to minimum"
        );
        Self {
            minimum,
            maximum: Some(maximum),
        }
    }

    /// The check a chain injects when a step wants a default cardinality
    /// guard: at least one result.
    #[must_use]
    pub fn default_amount() -> Self {
        Self::at_least(1)
    }
}

impl<S: Subject> Step<S> for AmountStep {
    fn execute(&self, current: &Value<S>, _meta: &StepMeta) -> Outcome<S> {
        let count = current.count();

        if count < self.minimum {
            if count == 0 {
                return Outcome::pending(
                    Reason::new()
                        .text("no results were found, instead of a minimum of ")
                        .count(self.minimum)
                        .text(" results"),
                );
            }
            return Outcome::pending(
                Reason::new()
                    .text("only ")
                    .count(count)
                    .text(" results were found, instead of a minimum of ")
                    .count(self.minimum)
                    .text(" results"),
            );
        }

        if let Some(maximum) = self.maximum {
            if count > maximum {
                return Outcome::pending(
                    Reason::new()
                        .count(count)
                        .text(" results were found, instead of a maximum of ")
                        .count(maximum)
                        .text(" results"),
                );
            }
        }

        Outcome::Success(current.clone())
    }

    fn describe(&self, timeout: Duration) -> String {
        let prefix = format!("waits up to {} seconds until", format_seconds(timeout));

        match self.maximum {
            Some(maximum) if maximum == self.minimum => {
                format!("{prefix} exactly {} results are found", self.minimum)
            }
            None if self.minimum == 1 => format!("{prefix} a result is found"),
            None => format!("{prefix} {} or more results are found", self.minimum),
            Some(maximum) => format!(
                "{prefix} between {} and {maximum} (inclusive) results are found",
                self.minimum
            ),
        }
    }

    fn applies_amount_check(&self) -> bool {
        true
    }
}

// ============================================================================
// Delay
// ============================================================================

/// Pending until a fixed duration has elapsed since the execution started.
///
/// Reports its duration as an additional deadline so the execution re-checks
/// the moment the delay lapses, even without a change signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayStep {
    delay: Duration,
}

impl DelayStep {
    /// Wait for `delay` from the execution's start time.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl<S: Subject> Step<S> for DelayStep {
    fn execute(&self, current: &Value<S>, meta: &StepMeta) -> Outcome<S> {
        let elapsed = meta.elapsed();
        if elapsed < self.delay {
            return Outcome::pending(
                Reason::new()
                    .text("the delay of ")
                    .seconds(self.delay)
                    .text(" seconds has not yet elapsed, only ")
                    .seconds(elapsed)
                    .text(" seconds have elapsed so far"),
            );
        }
        Outcome::Success(current.clone())
    }

    fn describe(&self, _timeout: Duration) -> String {
        format!(
            "waits until {} seconds have elapsed since the start of the execution",
            format_seconds(self.delay)
        )
    }

    fn additional_deadlines(&self) -> Vec<Duration> {
        vec![self.delay]
    }
}

// ============================================================================
// Noop
// ============================================================================

/// Passes the value through unchanged and describes nothing.
///
/// The carrier for chain-level directives that need a node but no behavior:
/// timeout re-labeling and start-time overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopStep;

impl NoopStep {
    /// The no-op step.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S: Subject> Step<S> for NoopStep {
    fn execute(&self, current: &Value<S>, _meta: &StepMeta) -> Outcome<S> {
        Outcome::Success(current.clone())
    }

    fn describe(&self, _timeout: Duration) -> String {
        String::new()
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Keeps only subjects satisfying a caller predicate.
///
/// Nothing stays nothing, lists are filtered, and a single subject is kept
/// or dropped. Always succeeds; pair with an amount check to require
/// survivors.
pub struct FilterStep<S: Subject> {
    label: String,
    predicate: Arc<dyn Fn(&S) -> bool + Send + Sync>,
}

impl<S: Subject> FilterStep<S> {
    /// Filter by `predicate`; `label` names it in descriptions.
    pub fn new(
        label: impl Into<String>,
        predicate: impl Fn(&S) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl<S: Subject> Step<S> for FilterStep<S> {
    fn execute(&self, current: &Value<S>, _meta: &StepMeta) -> Outcome<S> {
        match current {
            Value::None => Outcome::Success(Value::None),
            Value::One(subject) => {
                if (self.predicate)(subject) {
                    Outcome::Success(current.clone())
                } else {
                    Outcome::Success(Value::None)
                }
            }
            Value::Many(list) => {
                let kept: Vec<S> = list
                    .iter()
                    .filter(|subject| (self.predicate)(subject))
                    .cloned()
                    .collect();
                Outcome::Success(Value::from(kept))
            }
        }
    }

    fn describe(&self, _timeout: Duration) -> String {
        format!(
            "but only including results that match a callback: `{}`",
            describe_label(&self.label)
        )
    }
}

impl<S: Subject> fmt::Debug for FilterStep<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStep")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// First
// ============================================================================

/// Narrows a list to its first element.
///
/// An empty list becomes nothing; a single subject or nothing passes
/// through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstStep;

impl FirstStep {
    /// The first-element step.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S: Subject> Step<S> for FirstStep {
    fn execute(&self, current: &Value<S>, _meta: &StepMeta) -> Outcome<S> {
        match current {
            Value::Many(list) => Outcome::Success(Value::from(list.first().cloned())),
            other => Outcome::Success(other.clone()),
        }
    }

    fn describe(&self, _timeout: Duration) -> String {
        "but only returning the first result".to_owned()
    }
}

/// Quote a text fragment the way descriptions quote caller-supplied strings.
#[must_use]
pub fn quote_label(label: &str) -> String {
    format!("{LEFT_QUOTE}{label}{RIGHT_QUOTE}")
}
