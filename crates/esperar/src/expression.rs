//! Immutable, back-linked expression chains.
//!
//! An [`Expression`] is one configured node in a chain: a step, the node
//! timeout it runs under, optional start-time directives, and a link to the
//! node before it. Appending never mutates ancestors, so a prefix may be
//! shared by any number of longer chains. Nodes that want a default
//! cardinality guard eagerly grow a synthetic amount node that acts as the
//! chain's effective leaf.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::engine::WaiterCore;
use crate::execution::Execution;
use crate::result::WaitResult;
use crate::step::Step;
use crate::steps::AmountStep;
use crate::subject::Subject;

/// A start-time directive carried by a chain node.
///
/// Directives are folded left-to-right over the whole chain when an
/// execution starts, so the last directive in chain order wins, including a
/// later [`Reset`](Self::Reset) undoing an earlier absolute override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTimeOverride {
    /// Reset the execution's start time to the moment of the first check.
    Reset,
    /// Pin the execution's start time to an absolute clock timestamp.
    At(u64),
}

struct ExpressionInner<S: Subject> {
    engine: Arc<WaiterCore<S>>,
    previous: Option<Expression<S>>,
    depth: usize,
    step: Arc<dyn Step<S>>,
    timeout: Duration,
    /// The node timeout plus the step's additional deadlines, in that order.
    deadlines: Vec<Duration>,
    override_start: Option<StartTimeOverride>,
    wants_default_amount_check: bool,
    /// Synthetic "amount >= 1" leaf, present iff `wants_default_amount_check`.
    default_amount_child: OnceLock<Expression<S>>,
    /// Root-to-leaf chain through this node, built on first access.
    chain_cache: OnceLock<Arc<[Expression<S>]>>,
}

/// One node of an immutable wait-expression chain.
///
/// Cloning is cheap (a shared handle). A node is a pure description: nothing
/// runs until [`execute`](Self::execute) or
/// [`execute_once`](Self::execute_once) is called, and executing never
/// mutates the chain.
pub struct Expression<S: Subject> {
    inner: Arc<ExpressionInner<S>>,
}

impl<S: Subject> Clone for Expression<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Subject> Expression<S> {
    pub(crate) fn new_node(
        engine: Arc<WaiterCore<S>>,
        previous: Option<Expression<S>>,
        step: Arc<dyn Step<S>>,
        timeout: Duration,
        override_start: Option<StartTimeOverride>,
    ) -> Self {
        let depth = previous.as_ref().map_or(0, |node| node.inner.depth + 1);
        let previous_wants = previous
            .as_ref()
            .is_some_and(|node| node.inner.wants_default_amount_check);
        let wants = (previous_wants || step.wants_default_amount_check())
            && !step.applies_amount_check();

        let mut deadlines = vec![timeout];
        deadlines.extend(step.additional_deadlines());

        let node = Self {
            inner: Arc::new(ExpressionInner {
                engine,
                previous,
                depth,
                step,
                timeout,
                deadlines,
                override_start,
                wants_default_amount_check: wants,
                default_amount_child: OnceLock::new(),
                chain_cache: OnceLock::new(),
            }),
        };

        if wants {
            // The synthetic leaf applies an amount check, so it can never
            // itself want one: the recursion stops after one level.
            let child = Self::new_node(
                Arc::clone(&node.inner.engine),
                Some(node.clone()),
                Arc::new(AmountStep::default_amount()),
                timeout,
                None,
            );
            let _ = node.inner.default_amount_child.set(child);
        }

        node
    }

    /// Append a step after this node, producing a new leaf. `timeout`
    /// defaults to this node's timeout.
    pub(crate) fn append(
        &self,
        step: Arc<dyn Step<S>>,
        timeout: Option<Duration>,
        override_start: Option<StartTimeOverride>,
    ) -> Self {
        Self::new_node(
            Arc::clone(&self.inner.engine),
            Some(self.clone()),
            step,
            timeout.unwrap_or(self.inner.timeout),
            override_start,
        )
    }

    pub(crate) fn engine(&self) -> &Arc<WaiterCore<S>> {
        &self.inner.engine
    }

    /// Position in the authored chain; the first node is depth 0. Synthetic
    /// amount leaves count like authored nodes.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// The node before this one, `None` at the chain root.
    #[must_use]
    pub fn previous(&self) -> Option<&Expression<S>> {
        self.inner.previous.as_ref()
    }

    /// The step this node runs.
    #[must_use]
    pub fn node_step(&self) -> &dyn Step<S> {
        &*self.inner.step
    }

    /// The deadline governing this node while it is the first blocker.
    #[must_use]
    pub fn node_timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// This node's deadline offsets: its timeout plus the step's additional
    /// deadlines.
    #[must_use]
    pub fn deadlines(&self) -> &[Duration] {
        &self.inner.deadlines
    }

    /// The start-time directive carried by this node, if any.
    #[must_use]
    pub fn start_time_override(&self) -> Option<StartTimeOverride> {
        self.inner.override_start
    }

    /// Whether the effective chain through this node ends in a synthetic
    /// default amount check.
    #[must_use]
    pub fn wants_default_amount_check(&self) -> bool {
        self.inner.wants_default_amount_check
    }

    /// Whether two handles name the same chain node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The effective chain through this node, root first. When this node
    /// wants a default amount check, the synthetic amount node is the
    /// returned leaf. Built once and cached; never mutates ancestors.
    #[must_use]
    pub fn chain(&self) -> Arc<[Expression<S>]> {
        if let Some(child) = self.inner.default_amount_child.get() {
            return child.chain();
        }
        Arc::clone(self.inner.chain_cache.get_or_init(|| {
            let mut nodes = Vec::with_capacity(self.inner.depth + 1);
            let mut current = Some(self.clone());
            while let Some(node) = current {
                current = node.inner.previous.clone();
                nodes.push(node);
            }
            nodes.reverse();
            Arc::from(nodes)
        }))
    }

    /// Human description of the effective chain: each node's non-empty
    /// fragment, joined with ", ", in a fixed frame.
    #[must_use]
    pub fn describe(&self) -> String {
        let chain = self.chain();
        let mut fragments = Vec::new();
        for node in chain.iter() {
            let fragment = node.inner.step.describe(node.inner.timeout);
            if !fragment.is_empty() {
                fragments.push(fragment);
            }
        }
        format!("The expression {}.", fragments.join(", "))
    }

    /// Create an execution of this chain without starting it.
    #[must_use]
    pub fn prepare(&self) -> Execution<S> {
        Execution::new(Arc::clone(&self.inner.engine), self.clone())
    }

    /// Run this chain until it succeeds, fails fatally, or the first
    /// blocking node outlives its deadline. Each call creates a fresh
    /// execution.
    ///
    /// # Errors
    /// [`crate::WaitError::Timeout`] when a pending node's deadline expires;
    /// [`crate::WaitError::Fatal`] when a step fails permanently.
    pub async fn execute(&self) -> WaitResult<S> {
        WaiterCore::execute_expression(Arc::clone(&self.inner.engine), self.clone()).await
    }

    /// Check this chain exactly once, synchronously. The check never arms
    /// deadline timers and never registers for change observation, so it
    /// works without an async runtime.
    ///
    /// # Errors
    /// [`crate::WaitError::Unsatisfied`] when the chain is still pending
    /// after the single check; [`crate::WaitError::Fatal`] when a step fails
    /// permanently.
    pub fn execute_once(&self) -> WaitResult<S> {
        WaiterCore::execute_expression_once(Arc::clone(&self.inner.engine), self.clone())
    }
}

impl<S: Subject> fmt::Debug for Expression<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("depth", &self.inner.depth)
            .field("step", &self.inner.step)
            .field("timeout", &self.inner.timeout)
            .field(
                "wants_default_amount_check",
                &self.inner.wants_default_amount_check,
            )
            .finish_non_exhaustive()
    }
}
