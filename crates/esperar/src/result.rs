//! Error taxonomy for wait executions.
//!
//! Pending is not an error: it is retried until the pending node's own
//! deadline, at which point it becomes a [`WaitError::Timeout`]. Fatal step
//! failures reject immediately. Invalid-state errors are returned
//! synchronously from the misused call, never through the outcome future.
//! All messages are composed lazily, when an error is actually displayed.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::expression::Expression;
use crate::outcome::{format_seconds, Failure, Reason, StepError};
use crate::subject::Subject;
use crate::value::Value;

/// What an outcome future resolves to: the final running value, or the error
/// that fulfilled the execution.
pub type WaitResult<S> = Result<Value<S>, WaitError<S>>;

/// A still-pending node outlived its own deadline.
///
/// Carries the failing node and the executed expression so consumers can
/// introspect programmatically instead of parsing message text.
#[derive(Debug, Clone)]
pub struct TimeoutError<S: Subject> {
    timeout: Duration,
    reason: Reason,
    failing: Expression<S>,
    executed: Expression<S>,
}

impl<S: Subject> TimeoutError<S> {
    pub(crate) fn new(
        timeout: Duration,
        reason: Reason,
        failing: Expression<S>,
        executed: Expression<S>,
    ) -> Self {
        Self {
            timeout,
            reason,
            failing,
            executed,
        }
    }

    /// The deadline that expired: the pending node's own timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Why the failing node was still pending, as an unrendered template.
    #[must_use]
    pub fn reason(&self) -> &Reason {
        &self.reason
    }

    /// The node that was still pending when the deadline expired. Its
    /// [`Expression::describe`] covers the chain up to and including it.
    #[must_use]
    pub fn failing_expression(&self) -> &Expression<S> {
        &self.failing
    }

    /// The expression the execution was created from; its
    /// [`Expression::describe`] covers the whole chain.
    #[must_use]
    pub fn full_expression(&self) -> &Expression<S> {
        &self.executed
    }
}

impl<S: Subject> fmt::Display for TimeoutError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wait expression timed out after {} seconds because {}. {}",
            format_seconds(self.timeout),
            self.reason,
            self.failing.describe()
        )
    }
}

impl<S: Subject> std::error::Error for TimeoutError<S> {}

/// Why a wait execution failed.
#[derive(Debug, Clone, Error)]
pub enum WaitError<S: Subject> {
    /// A pending node's own deadline expired before the chain was satisfied.
    #[error(transparent)]
    Timeout(TimeoutError<S>),

    /// A step failed permanently: an explicit fatal outcome or a step's
    /// error object. Remaining deadlines are ignored.
    #[error("{failure}")]
    Fatal {
        /// The reason template or error object the step reported.
        failure: Failure,
    },

    /// A single synchronous probe ([`Expression::execute_once`]) ended while
    /// the chain was still unsatisfied.
    #[error("{reason}")]
    Unsatisfied {
        /// Why the first blocking node was still pending.
        reason: Reason,
    },

    /// Programmer error: the execution was driven out of order. Returned
    /// synchronously by the misused call, never through the outcome future.
    #[error("{message}")]
    InvalidState {
        /// What was misused.
        message: &'static str,
    },
}

impl<S: Subject> WaitError<S> {
    pub(crate) fn invalid_state(message: &'static str) -> Self {
        Self::InvalidState { message }
    }

    pub(crate) fn fatal(failure: Failure) -> Self {
        Self::Fatal { failure }
    }

    /// Whether this is a deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether this is a permanent step failure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    /// Whether this is a misuse of the execution state machine.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// The timeout details, when this is a deadline expiry.
    #[must_use]
    pub fn as_timeout(&self) -> Option<&TimeoutError<S>> {
        match self {
            Self::Timeout(timeout) => Some(timeout),
            _ => None,
        }
    }

    /// The step error object, when a fatal failure carried one.
    #[must_use]
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::Fatal { failure } => failure.error(),
            _ => None,
        }
    }
}
