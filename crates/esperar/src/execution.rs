//! Per-invocation execution state machine.
//!
//! An [`Execution`] runs one chain from one `execute` call: it moves from
//! not-started through running to fulfilled, and fulfills exactly once. On
//! start it arms one timer per distinct deadline offset in the chain and
//! folds the chain's start-time directives; every subsequent wake, whether
//! from a deadline timer, a change signal, or a manual [`check`], re-walks
//! the chain from the top against the current state of the world.
//!
//! [`check`]: Execution::check

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;

use crate::engine::WaiterCore;
use crate::expression::{Expression, StartTimeOverride};
use crate::outcome::{Outcome, Reason};
use crate::result::{TimeoutError, WaitError, WaitResult};
use crate::step::StepMeta;
use crate::subject::Subject;
use crate::sync::lock;
use crate::timer::Timer;
use crate::value::Value;

pub(crate) const MSG_NOT_STARTED: &str = "this execution has not been started";
pub(crate) const MSG_ALREADY_STARTED: &str = "this execution has already been started";
pub(crate) const MSG_ALREADY_FULFILLED: &str = "this execution has already been fulfilled";
pub(crate) const MSG_ABANDONED: &str = "this execution was dropped before it fulfilled";

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Fulfilled,
}

/// How a check participates in the run's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckMode {
    /// Arm deadline timers and observe scopes so later wakeups re-check.
    Observed,
    /// Single probe with no later wakeups: nothing is armed or observed.
    Once,
}

struct ExecutionState<S: Subject> {
    phase: Phase,
    start_ms: u64,
    /// Scopes currently registered for change observation.
    scopes: HashSet<S::Scope>,
    /// Armed deadline timers, keyed by their offset in milliseconds.
    timers: HashMap<u64, Timer>,
}

pub(crate) struct ExecutionCore<S: Subject> {
    id: u64,
    engine: Arc<WaiterCore<S>>,
    expression: Expression<S>,
    chain: Arc<[Expression<S>]>,
    weak_self: Weak<ExecutionCore<S>>,
    state: Mutex<ExecutionState<S>>,
    outcome_tx: watch::Sender<Option<WaitResult<S>>>,
    outcome_rx: watch::Receiver<Option<WaitResult<S>>>,
}

impl<S: Subject> ExecutionCore<S> {
    fn is_running(&self) -> bool {
        lock(&self.state).phase == Phase::Running
    }

    fn handle(&self) -> Option<Execution<S>> {
        self.weak_self.upgrade().map(|core| Execution { core })
    }

    /// Start the execution: mark it running, arm one timer per distinct
    /// deadline offset (observed runs only), fold the chain's start-time
    /// directives, then run the first check. Returns the pending reason when
    /// the chain is not yet satisfied.
    fn first_check(&self, mode: CheckMode) -> Result<Option<Reason>, WaitError<S>> {
        let mut state = lock(&self.state);
        if state.phase != Phase::NotStarted {
            return Err(WaitError::invalid_state(MSG_ALREADY_STARTED));
        }
        state.phase = Phase::Running;

        let now = self.engine.clock().now_ms();
        state.start_ms = now;
        for node in self.chain.iter() {
            if mode == CheckMode::Observed {
                for deadline in node.deadlines() {
                    let offset = duration_ms(*deadline);
                    if !state.timers.contains_key(&offset) {
                        state.timers.insert(offset, self.arm_deadline(*deadline));
                    }
                }
            }
            match node.start_time_override() {
                Some(StartTimeOverride::Reset) => state.start_ms = now,
                Some(StartTimeOverride::At(start)) => state.start_ms = start,
                None => {}
            }
        }
        tracing::debug!(
            execution = self.id,
            start_ms = state.start_ms,
            timers = state.timers.len(),
            "execution started"
        );

        Ok(self.check_locked(&mut state, mode))
    }

    fn arm_deadline(&self, deadline: Duration) -> Timer {
        let weak = self.weak_self.clone();
        let timer = Timer::new(
            deadline,
            Arc::clone(self.engine.timer_backend()),
            move || {
                if let Some(core) = weak.upgrade() {
                    tracing::trace!(execution = core.id, "deadline timer fired");
                    core.check_tolerant();
                }
            },
        );
        timer.schedule();
        timer
    }

    /// Re-check from a timer or change signal: a no-op once fulfilled.
    pub(crate) fn check_tolerant(&self) {
        if self.is_running() {
            self.run_guarded_check();
        }
    }

    /// Re-check from the public API: misuse before start or after
    /// fulfillment is an error.
    fn check_strict(&self) -> Result<(), WaitError<S>> {
        {
            let state = lock(&self.state);
            match state.phase {
                Phase::NotStarted => return Err(WaitError::invalid_state(MSG_NOT_STARTED)),
                Phase::Fulfilled => {
                    return Err(WaitError::invalid_state(MSG_ALREADY_FULFILLED))
                }
                Phase::Running => {}
            }
        }
        self.run_guarded_check();
        Ok(())
    }

    /// One check with the check hooks fired around it, outside the state
    /// lock so hook code may inspect the execution freely.
    fn run_guarded_check(&self) {
        let hooks = self.engine.hooks_snapshot();
        let handle = self.handle();
        if let Some(handle) = &handle {
            hooks.notify_check_begin(handle);
        }
        {
            let mut state = lock(&self.state);
            if state.phase == Phase::Running {
                self.check_locked(&mut state, CheckMode::Observed);
            }
        }
        if let Some(handle) = &handle {
            hooks.notify_check_end(handle);
        }
    }

    fn start_with_hooks(&self, mode: CheckMode) -> Result<Option<Reason>, WaitError<S>> {
        let hooks = self.engine.hooks_snapshot();
        let handle = self.handle();
        if let Some(handle) = &handle {
            hooks.notify_check_begin(handle);
        }
        let outcome = self.first_check(mode);
        if let Some(handle) = &handle {
            hooks.notify_check_end(handle);
        }
        outcome
    }

    /// Walk the chain from the top, threading the value. Fulfills on full
    /// success, fatal failure, or an expired deadline at the first blocking
    /// node; otherwise reconciles scope registrations (observed runs only)
    /// and returns the pending reason.
    fn check_locked(&self, state: &mut ExecutionState<S>, mode: CheckMode) -> Option<Reason> {
        let check_start = self.engine.clock().now_ms();
        let meta = StepMeta::new(state.start_ms, check_start);

        let mut value = Value::None;
        let mut seen: HashSet<S::Scope> = HashSet::new();
        let mut blocked: Option<(Expression<S>, Reason)> = None;
        for node in self.chain.iter() {
            match node.node_step().execute(&value, &meta) {
                Outcome::Success(next) => {
                    next.collect_scopes(&mut seen);
                    value = next;
                }
                Outcome::Pending(reason) => {
                    blocked = Some((node.clone(), reason));
                    break;
                }
                Outcome::FatalFailure(failure) => {
                    self.fulfill_locked(state, Err(WaitError::fatal(failure)));
                    return None;
                }
            }
        }

        let Some((node, reason)) = blocked else {
            self.fulfill_locked(state, Ok(value));
            return None;
        };

        let elapsed_ms = check_start.saturating_sub(state.start_ms);
        if elapsed_ms >= duration_ms(node.node_timeout()) {
            let error = TimeoutError::new(
                node.node_timeout(),
                reason,
                node,
                self.expression.clone(),
            );
            self.fulfill_locked(state, Err(WaitError::Timeout(error)));
            return None;
        }

        tracing::trace!(
            execution = self.id,
            depth = node.depth(),
            elapsed_ms,
            "chain still pending"
        );
        if mode == CheckMode::Observed {
            self.reconcile_scopes(state, seen);
        }
        Some(reason)
    }

    /// Register scopes the chain produced this check and unregister the
    /// ones it no longer does.
    fn reconcile_scopes(&self, state: &mut ExecutionState<S>, seen: HashSet<S::Scope>) {
        if state.scopes == seen {
            return;
        }
        for scope in state.scopes.difference(&seen) {
            self.engine.observers().unregister_execution(scope, self.id);
        }
        for scope in seen.difference(&state.scopes) {
            self.engine
                .observers()
                .register_execution(scope, self.id, self.weak_self.clone());
        }
        state.scopes = seen;
    }

    /// Settle exactly once: cancel every armed timer, unregister every
    /// scope, then publish the result.
    fn fulfill_locked(&self, state: &mut ExecutionState<S>, result: WaitResult<S>) {
        state.phase = Phase::Fulfilled;
        for (_, timer) in state.timers.drain() {
            timer.cancel();
        }
        let scopes = std::mem::take(&mut state.scopes);
        for scope in &scopes {
            self.engine.observers().unregister_execution(scope, self.id);
        }
        match &result {
            Ok(value) => {
                tracing::debug!(
                    execution = self.id,
                    results = value.count(),
                    "execution fulfilled"
                );
            }
            Err(error) => {
                tracing::debug!(execution = self.id, error = %error, "execution failed");
            }
        }
        let _ = self.outcome_tx.send(Some(result));
    }

    fn settled_result(&self) -> WaitResult<S> {
        self.outcome_rx
            .borrow()
            .clone()
            .unwrap_or_else(|| Err(WaitError::invalid_state(MSG_ABANDONED)))
    }
}

// ============================================================================
// Public handle
// ============================================================================

/// One run of a chain.
///
/// Handles are cheap to clone and all refer to the same run. The lifecycle
/// is start once, re-check any number of times while running, fulfill
/// exactly once; [`check`](Self::check) before [`start`](Self::start) or
/// after fulfillment is an error, while the engine's own wakeups quietly
/// stop once the execution has settled.
pub struct Execution<S: Subject> {
    core: Arc<ExecutionCore<S>>,
}

impl<S: Subject> Clone for Execution<S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S: Subject> Execution<S> {
    pub(crate) fn new(engine: Arc<WaiterCore<S>>, expression: Expression<S>) -> Self {
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let id = engine.next_execution_id();
        let chain = expression.chain();
        let core = Arc::new_cyclic(|weak| ExecutionCore {
            id,
            engine,
            expression,
            chain,
            weak_self: weak.clone(),
            state: Mutex::new(ExecutionState {
                phase: Phase::NotStarted,
                start_ms: 0,
                scopes: HashSet::new(),
                timers: HashMap::new(),
            }),
            outcome_tx,
            outcome_rx,
        });
        Self { core }
    }

    /// Identifier of this run, unique within its engine.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.core.id
    }

    /// The expression this run was created from.
    #[must_use]
    pub fn expression(&self) -> &Expression<S> {
        &self.core.expression
    }

    /// Whether [`start`](Self::start) has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        lock(&self.core.state).phase != Phase::NotStarted
    }

    /// Whether the run has settled.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        lock(&self.core.state).phase == Phase::Fulfilled
    }

    /// Run the first check: arm the chain's deadline timers, fold its
    /// start-time directives, then check. The run may fulfill before this
    /// returns.
    ///
    /// # Errors
    /// [`WaitError::InvalidState`] when called more than once.
    pub fn start(&self) -> Result<(), WaitError<S>> {
        self.core.start_with_hooks(CheckMode::Observed).map(|_| ())
    }

    /// Re-check the chain now, regardless of timers and change signals.
    ///
    /// # Errors
    /// [`WaitError::InvalidState`] before [`start`](Self::start) or after
    /// the run has fulfilled. The check's own conclusion is published
    /// through [`outcome`](Self::outcome), not returned here.
    pub fn check(&self) -> Result<(), WaitError<S>> {
        self.core.check_strict()
    }

    /// A handle on the run's memoized result.
    #[must_use]
    pub fn outcome(&self) -> OutcomeHandle<S> {
        OutcomeHandle {
            receiver: self.core.outcome_rx.clone(),
        }
    }

    /// Check once and settle immediately: a still-pending chain becomes
    /// [`WaitError::Unsatisfied`]. The single check never arms deadline
    /// timers and never registers a scope, so it needs no async runtime.
    pub(crate) fn run_once(&self) -> WaitResult<S> {
        let pending = self.core.start_with_hooks(CheckMode::Once)?;
        if let Some(reason) = pending {
            let mut state = lock(&self.core.state);
            if state.phase == Phase::Running {
                self.core
                    .fulfill_locked(&mut state, Err(WaitError::Unsatisfied { reason }));
            }
        }
        self.core.settled_result()
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Arc<ExecutionCore<S>> {
        &self.core
    }
}

impl<S: Subject> fmt::Debug for Execution<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("id", &self.core.id)
            .field("started", &self.is_started())
            .field("fulfilled", &self.is_fulfilled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Outcome handle
// ============================================================================

/// A cloneable handle on an execution's memoized result.
///
/// The result is published exactly once; handles created before or after
/// fulfillment observe the same value.
#[derive(Debug, Clone)]
pub struct OutcomeHandle<S: Subject> {
    receiver: watch::Receiver<Option<WaitResult<S>>>,
}

impl<S: Subject> OutcomeHandle<S> {
    /// The result, if the execution has settled.
    #[must_use]
    pub fn peek(&self) -> Option<WaitResult<S>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the execution to settle.
    ///
    /// # Errors
    /// The execution's own error, or [`WaitError::InvalidState`] when the
    /// execution was dropped without ever fulfilling.
    pub async fn wait(mut self) -> WaitResult<S> {
        loop {
            let settled = self.receiver.borrow_and_update().clone();
            if let Some(result) = settled {
                return result;
            }
            if self.receiver.changed().await.is_err() {
                return Err(WaitError::invalid_state(MSG_ABANDONED));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::builder::Chainable;
    use crate::outcome::Failure;
    use crate::testutil::{harness, node, ScriptedStep};

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_check_before_start_is_rejected() {
            let fixture = harness();
            let execution = fixture.waiter.target(node(1, "a")).prepare();

            let error = execution.check().unwrap_err();
            assert!(error.is_invalid_state());
            assert_eq!(error.to_string(), MSG_NOT_STARTED);
            assert!(!execution.is_started());
        }

        #[test]
        fn test_start_twice_is_rejected() {
            let fixture = harness();
            let execution = fixture.waiter.target(node(1, "a")).prepare();

            execution.start().unwrap();
            let error = execution.start().unwrap_err();
            assert_eq!(error.to_string(), MSG_ALREADY_STARTED);
        }

        #[test]
        fn test_check_after_fulfillment_is_rejected() {
            let fixture = harness();
            let execution = fixture.waiter.target(node(1, "a")).prepare();

            execution.start().unwrap();
            assert!(execution.is_fulfilled());

            let error = execution.check().unwrap_err();
            assert!(error.is_invalid_state());
            assert_eq!(error.to_string(), MSG_ALREADY_FULFILLED);
        }

        #[test]
        fn test_immediate_success_fulfills_on_start() {
            let fixture = harness();
            let execution = fixture.waiter.target(node(1, "a")).prepare();

            execution.start().unwrap();
            let result = execution.outcome().peek().unwrap().unwrap();
            assert_eq!(result, Value::One(node(1, "a")));
            assert_eq!(fixture.backend.armed_len(), 0, "timers cancelled on fulfill");
        }

        #[test]
        fn test_internal_wakeups_are_noops_after_fulfillment() {
            let fixture = harness();
            let step = Arc::new(ScriptedStep::new("probe"));
            let chain = fixture
                .waiter
                .chain_node(step.clone(), Some(Duration::from_millis(100)), None);
            let execution = chain.prepare();

            execution.start().unwrap();
            assert!(execution.is_fulfilled());
            let runs = step.executions();

            execution.core().check_tolerant();
            assert_eq!(step.executions(), runs, "no re-walk after fulfillment");
        }

        #[test]
        fn test_outcome_handles_share_the_memoized_result() {
            let fixture = harness();
            let execution = fixture.waiter.target(node(1, "a")).prepare();
            let early = execution.outcome();
            assert!(early.peek().is_none());

            execution.start().unwrap();
            let late = execution.outcome();
            assert_eq!(
                early.peek().unwrap().unwrap(),
                late.peek().unwrap().unwrap()
            );
        }

        #[tokio::test]
        async fn test_wait_resolves_when_fulfilled_later() {
            let fixture = harness();
            let step = Arc::new(ScriptedStep::new("blocked"));
            step.queue(Outcome::pending(Reason::new().text("not yet")));
            let chain = fixture
                .waiter
                .chain_node(step.clone(), Some(Duration::from_millis(5_000)), None);
            let execution = chain.prepare();

            execution.start().unwrap();
            assert!(!execution.is_fulfilled());

            let waiter_task = tokio::spawn(execution.outcome().wait());
            tokio::task::yield_now().await;

            execution.check().unwrap();
            let result = waiter_task.await.unwrap().unwrap();
            assert_eq!(result, Value::None);
        }
    }

    mod deadline_tests {
        use super::*;

        #[test]
        fn test_one_timer_per_distinct_deadline() {
            let fixture = harness();
            let probe = Arc::new(
                ScriptedStep::new("probe").with_deadline(Duration::from_millis(2_500)),
            );
            probe.set_fallback(Outcome::pending(Reason::new().text("still waiting")));
            let chain = fixture
                .waiter
                .timeout(Duration::from_millis(1_000))
                .target(node(1, "root"))
                .chain_node(probe, None, None);
            let execution = chain.prepare();

            execution.start().unwrap();
            assert_eq!(
                fixture.backend.armed_delays(),
                [Duration::from_millis(1_000), Duration::from_millis(2_500)],
                "offsets 1000, 1000 and 2500 collapse to two timers"
            );
        }

        #[test]
        fn test_first_blocking_node_governs_the_deadline() {
            let fixture = harness();
            let blocked = Arc::new(ScriptedStep::new("never ready"));
            blocked.set_fallback(Outcome::pending(Reason::new().text("it is not ready")));
            let chain = fixture
                .waiter
                .timeout(Duration::from_millis(1_000))
                .target(node(1, "root"))
                .timeout(Duration::from_millis(5_000))
                .chain_node(blocked, None, None);
            let execution = chain.prepare();

            execution.start().unwrap();
            assert_eq!(fixture.backend.armed_len(), 2);

            // The 1000ms deadline belongs to an earlier, satisfied prefix:
            // its expiry must not fail the chain.
            fixture.clock.advance(Duration::from_millis(1_000));
            fixture.backend.fire(Duration::from_millis(1_000));
            assert!(!execution.is_fulfilled());

            fixture.clock.advance(Duration::from_millis(4_000));
            fixture.backend.fire(Duration::from_millis(5_000));
            let error = execution.outcome().peek().unwrap().unwrap_err();
            let timeout = error.as_timeout().unwrap();
            assert_eq!(timeout.timeout(), Duration::from_millis(5_000));

            // The root's scope was observed while pending; its teardown
            // tick is all that remains armed.
            assert_eq!(fixture.backend.fire(Duration::ZERO), 1);
            assert_eq!(fixture.backend.armed_len(), 0);
        }

        #[test]
        fn test_timeout_error_renders_blocker_and_chain() {
            let fixture = harness();
            let chain = fixture
                .waiter
                .timeout(Duration::from_millis(1_000))
                .target_with("store query", || Ok(Value::from(Vec::new())))
                .amount_at_least(1);
            let execution = chain.prepare();

            execution.start().unwrap();
            fixture.clock.advance(Duration::from_millis(1_000));
            fixture.backend.fire(Duration::from_millis(1_000));

            let error = execution.outcome().peek().unwrap().unwrap_err();
            assert_eq!(
                error.to_string(),
                "Wait expression timed out after 1 seconds because no results were \
                 found, instead of a minimum of 1 results. The expression sets the \
                 target using a callback: `store query`, waits up to 1 seconds until \
                 a result is found."
            );
            let timeout = error.as_timeout().unwrap();
            assert!(timeout.failing_expression().node_step().applies_amount_check());
            assert!(timeout.full_expression().ptr_eq(&chain));
        }

        #[test]
        fn test_backdated_start_can_expire_on_first_check() {
            let fixture = harness();
            fixture.clock.set(10_000);
            let blocked = Arc::new(ScriptedStep::new("gate"));
            blocked.set_fallback(Outcome::pending(Reason::new().text("the gate is closed")));
            let chain = fixture
                .waiter
                .timeout(Duration::from_millis(2_000))
                .start_time_at(1_000)
                .chain_node(blocked, None, None);
            let execution = chain.prepare();

            execution.start().unwrap();
            let error = execution.outcome().peek().unwrap().unwrap_err();
            assert!(error.is_timeout(), "elapsed 9000ms exceeds the 2000ms deadline");
        }
    }

    mod override_tests {
        use super::*;

        #[test]
        fn test_later_reset_undoes_absolute_override() {
            let fixture = harness();
            fixture.clock.set(5_000);
            let chain = fixture
                .waiter
                .start_time_at(1_000)
                .restart_start_time()
                .delay(Duration::from_millis(2_000));

            let error = chain.execute_once().unwrap_err();
            assert_eq!(
                error.to_string(),
                "the delay of 2 seconds has not yet elapsed, only 0 seconds have \
                 elapsed so far"
            );
        }

        #[test]
        fn test_later_absolute_override_wins() {
            let fixture = harness();
            fixture.clock.set(5_000);
            let chain = fixture
                .waiter
                .restart_start_time()
                .start_time_at(1_000)
                .delay(Duration::from_millis(2_000));

            let resolved = chain.execute_once().unwrap();
            assert_eq!(resolved, Value::None);
        }
    }

    mod once_tests {
        use super::*;

        #[test]
        fn test_pending_once_run_reports_unsatisfied() {
            let fixture = harness();
            let chain = fixture
                .waiter
                .target_with("store query", || Ok(Value::from(Vec::new())))
                .amount_at_least(1);

            let error = chain.execute_once().unwrap_err();
            assert!(matches!(error, WaitError::Unsatisfied { .. }));
            assert_eq!(
                error.to_string(),
                "no results were found, instead of a minimum of 1 results"
            );
        }

        #[test]
        fn test_once_run_leaves_no_timers_or_scopes() {
            let fixture = harness();
            let chain = fixture
                .waiter
                .target(node(1, "root"))
                .target_with("store query", || Ok(Value::from(Vec::new())))
                .amount_at_least(1);

            let _ = chain.execute_once().unwrap_err();

            // The single check neither arms deadline timers nor registers
            // the scopes it touches.
            assert_eq!(fixture.backend.armed_len(), 0, "nothing was armed");
            assert_eq!(fixture.waiter.observed_scope_count(), 0);
        }

        #[test]
        fn test_fatal_failure_short_circuits() {
            let fixture = harness();
            let poisoned = Arc::new(ScriptedStep::new("poisoned"));
            poisoned.set_fallback(Outcome::FatalFailure(Failure::Reason(
                Reason::new().text("the backing store is gone"),
            )));
            let downstream = Arc::new(ScriptedStep::new("downstream"));
            let chain = fixture
                .waiter
                .chain_node(poisoned, None, None)
                .chain_node(downstream.clone(), None, None);

            let error = chain.execute_once().unwrap_err();
            assert!(error.is_fatal());
            assert_eq!(error.to_string(), "the backing store is gone");
            assert_eq!(downstream.executions(), 0, "walk stops at the fatal node");
        }

        #[test]
        fn test_fatal_step_error_is_surfaced() {
            let fixture = harness();

            #[derive(Debug, thiserror::Error)]
            #[error("store handle revoked")]
            struct Revoked;

            let chain = fixture
                .waiter
                .target_with("revoked store", || Err(Arc::new(Revoked) as _));

            let error = chain.execute_once().unwrap_err();
            assert!(error.is_fatal());
            assert_eq!(error.to_string(), "store handle revoked");
            assert!(error.step_error().is_some());
        }
    }
}
