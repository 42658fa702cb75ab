//! Fluent chain construction.
//!
//! [`Chainable`] is the append surface shared by [`Waiter`](crate::Waiter),
//! where a node starts a new chain under the engine default timeout, and
//! [`Expression`], where a node extends the chain and inherits the previous
//! node's timeout.

use std::sync::Arc;
use std::time::Duration;

use crate::expression::{Expression, StartTimeOverride};
use crate::outcome::StepError;
use crate::step::Step;
use crate::steps::{AmountStep, DelayStep, FilterStep, FirstStep, NoopStep, TargetStep};
use crate::subject::Subject;
use crate::value::Value;

/// Anything a chain node can be appended to.
///
/// All chain verbs are provided methods over [`chain_node`], so custom
/// implementors only decide where appended nodes attach and which timeout
/// they default to.
///
/// [`chain_node`]: Self::chain_node
pub trait Chainable<S: Subject> {
    /// Append one configured node. A `timeout` of `None` takes the
    /// implementor's default; `override_start` attaches a start-time
    /// directive to the node.
    fn chain_node(
        &self,
        step: Arc<dyn Step<S>>,
        timeout: Option<Duration>,
        override_start: Option<StartTimeOverride>,
    ) -> Expression<S>;

    /// Append a caller-provided step.
    fn step(&self, step: impl Step<S> + 'static) -> Expression<S> {
        self.chain_node(Arc::new(step), None, None)
    }

    /// Replace the running value with a fixed target.
    fn target(&self, value: impl Into<Value<S>>) -> Expression<S> {
        self.step(TargetStep::fixed(value))
    }

    /// Replace the running value with whatever `provider` resolves on each
    /// check. A provider error fails the execution fatally. `label` names
    /// the callback in descriptions.
    fn target_with(
        &self,
        label: impl Into<String>,
        provider: impl Fn() -> Result<Value<S>, StepError> + Send + Sync + 'static,
    ) -> Expression<S> {
        self.step(TargetStep::provider(label, provider))
    }

    /// Require exactly `count` results.
    fn amount(&self, count: usize) -> Expression<S> {
        self.step(AmountStep::exactly(count))
    }

    /// Require at least `minimum` results.
    fn amount_at_least(&self, minimum: usize) -> Expression<S> {
        self.step(AmountStep::at_least(minimum))
    }

    /// Require between `minimum` and `maximum` results, inclusive.
    ///
    /// # Panics
    /// Panics if `minimum > maximum`.
    fn amount_between(&self, minimum: usize, maximum: usize) -> Expression<S> {
        self.step(AmountStep::between(minimum, maximum))
    }

    /// Stay pending until `delay` has elapsed since the execution's start
    /// time. The node also schedules a re-check at that moment, so a chain
    /// blocked only by the delay completes without an external change.
    fn delay(&self, delay: Duration) -> Expression<S> {
        self.step(DelayStep::new(delay))
    }

    /// Append a no-op node carrying a new timeout for the nodes chained
    /// after it.
    fn timeout(&self, timeout: Duration) -> Expression<S> {
        self.chain_node(Arc::new(NoopStep::new()), Some(timeout), None)
    }

    /// Keep only results satisfying `predicate`. `label` names the
    /// predicate in descriptions.
    fn filter(
        &self,
        label: impl Into<String>,
        predicate: impl Fn(&S) -> bool + Send + Sync + 'static,
    ) -> Expression<S> {
        self.step(FilterStep::new(label, predicate))
    }

    /// Narrow a list of results to its first element.
    fn first(&self) -> Expression<S> {
        self.step(FirstStep::new())
    }

    /// Pin the execution's start time to the absolute timestamp
    /// `start_ms`, backdating or postponing every deadline and delay.
    /// Directives fold left to right, so a later directive wins.
    fn start_time_at(&self, start_ms: u64) -> Expression<S> {
        self.chain_node(
            Arc::new(NoopStep::new()),
            None,
            Some(StartTimeOverride::At(start_ms)),
        )
    }

    /// Reset the execution's start time to the moment of the first check,
    /// undoing any earlier directive in the chain.
    fn restart_start_time(&self) -> Expression<S> {
        self.chain_node(Arc::new(NoopStep::new()), None, Some(StartTimeOverride::Reset))
    }
}

impl<S: Subject> Chainable<S> for Expression<S> {
    fn chain_node(
        &self,
        step: Arc<dyn Step<S>>,
        timeout: Option<Duration>,
        override_start: Option<StartTimeOverride>,
    ) -> Expression<S> {
        self.append(step, timeout, override_start)
    }
}
