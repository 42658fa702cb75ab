//! The step plugin contract.
//!
//! A step is one condition/transform unit in a chain: it receives the
//! previous step's value and reports success, pending, or fatal failure.
//! Concrete steps that query an observed tree (selector lookups, readiness
//! probes, visibility filters) live with the tree binding; this crate ships
//! the tree-agnostic kit in [`crate::steps`].

use std::fmt;
use std::time::Duration;

use crate::outcome::Outcome;
use crate::subject::Subject;
use crate::value::Value;

/// Timing context handed to every step execution.
///
/// Supplied so time-based steps can compute elapsed time without owning a
/// clock. Both timestamps come from the engine's clock; only their
/// difference is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMeta {
    execution_start_ms: u64,
    check_start_ms: u64,
}

impl StepMeta {
    /// Metadata for a check that began at `check_start_ms` on an execution
    /// whose (possibly overridden) start is `execution_start_ms`.
    #[must_use]
    pub fn new(execution_start_ms: u64, check_start_ms: u64) -> Self {
        Self {
            execution_start_ms,
            check_start_ms,
        }
    }

    /// When the execution started, in clock milliseconds.
    #[must_use]
    pub fn execution_start_ms(&self) -> u64 {
        self.execution_start_ms
    }

    /// When the current check started, in clock milliseconds.
    #[must_use]
    pub fn check_start_ms(&self) -> u64 {
        self.check_start_ms
    }

    /// Time elapsed between execution start and this check. Zero if the
    /// execution start was overridden into the future.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.check_start_ms.saturating_sub(self.execution_start_ms))
    }
}

/// One condition/transform unit in a chain.
///
/// Implementations must be immutable once constructed: `execute` is a pure
/// function of `(current, meta)` plus whatever the step closed over at
/// construction, and must return exactly one [`Outcome`] without blocking.
/// A step signals an exceptional failure by returning
/// [`Outcome::fatal_error`]; panics are not caught by the engine.
pub trait Step<S: Subject>: Send + Sync + fmt::Debug {
    /// Evaluate this step against the running value.
    fn execute(&self, current: &Value<S>, meta: &StepMeta) -> Outcome<S>;

    /// A human fragment describing this step, or an empty string for steps
    /// with no narrative. `timeout` is the node timeout the step runs under,
    /// for steps that phrase their description around it.
    fn describe(&self, timeout: Duration) -> String;

    /// Whether this step produces a new candidate set that should be guarded
    /// by a default cardinality check, unless the caller specifies one
    /// downstream.
    fn wants_default_amount_check(&self) -> bool {
        false
    }

    /// Whether this step itself is a cardinality check, suppressing the
    /// default.
    fn applies_amount_check(&self) -> bool {
        false
    }

    /// Extra deadline offsets (beyond the node timeout) at which the
    /// execution should re-check even without a change signal.
    fn additional_deadlines(&self) -> Vec<Duration> {
        Vec::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_subtracts_start() {
        let meta = StepMeta::new(1000, 3500);
        assert_eq!(meta.elapsed(), Duration::from_millis(2500));
        assert_eq!(meta.execution_start_ms(), 1000);
        assert_eq!(meta.check_start_ms(), 3500);
    }

    #[test]
    fn test_elapsed_saturates_for_future_start() {
        let meta = StepMeta::new(5000, 3000);
        assert_eq!(meta.elapsed(), Duration::ZERO);
    }
}
