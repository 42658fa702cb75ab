//! Engine root: the [`Waiter`] handle, its builder and configuration, and
//! execution lifecycle hooks.
//!
//! A waiter owns the clock, the timer backend and the change-observation
//! registry. Expressions rooted on it share that core, so chains built from
//! one waiter wake up through the same timers and change signals.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binding::{NullBinding, ScopeBinding};
use crate::builder::Chainable;
use crate::clock::{Clock, SystemClock};
use crate::execution::Execution;
use crate::expression::{Expression, StartTimeOverride};
use crate::observer::ScopeObservers;
use crate::result::WaitResult;
use crate::step::Step;
use crate::subject::Subject;
use crate::sync::lock;
use crate::timer::{TimerBackend, TokioBackend};

/// Timeout applied to nodes rooted directly on a [`Waiter`], unless the
/// builder or a `timeout` node says otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

// ============================================================================
// Configuration
// ============================================================================

/// Engine settings, loadable from configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiterConfig {
    /// Timeout in milliseconds for nodes rooted directly on the waiter.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

impl WaiterConfig {
    /// The configured default timeout as a [`Duration`].
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

// ============================================================================
// Hooks
// ============================================================================

type HookFn<S> = Arc<dyn Fn(&Execution<S>) + Send + Sync>;

/// Callbacks observing execution lifecycle events.
///
/// `execute` hooks bracket one awaited run, `check` hooks bracket every
/// single chain check, including the one performed by `start`. Hooks run
/// outside the engine's internal locks, so they may inspect the execution
/// they are handed, including [`Execution::is_fulfilled`] and
/// [`Execution::outcome`].
pub struct WaitHooks<S: Subject> {
    execute_begin: Option<HookFn<S>>,
    execute_end: Option<HookFn<S>>,
    check_begin: Option<HookFn<S>>,
    check_end: Option<HookFn<S>>,
}

impl<S: Subject> WaitHooks<S> {
    /// Hooks with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` when a run begins executing.
    #[must_use]
    pub fn on_execute_begin(mut self, hook: impl Fn(&Execution<S>) + Send + Sync + 'static) -> Self {
        self.execute_begin = Some(Arc::new(hook));
        self
    }

    /// Run `hook` when a run finishes executing, fulfilled or failed.
    #[must_use]
    pub fn on_execute_end(mut self, hook: impl Fn(&Execution<S>) + Send + Sync + 'static) -> Self {
        self.execute_end = Some(Arc::new(hook));
        self
    }

    /// Run `hook` before every chain check. A wakeup that arrives while the
    /// run is fulfilling still fires its begin/end pair even though the walk
    /// itself is skipped, so the pair count is an upper bound on walks.
    #[must_use]
    pub fn on_check_begin(mut self, hook: impl Fn(&Execution<S>) + Send + Sync + 'static) -> Self {
        self.check_begin = Some(Arc::new(hook));
        self
    }

    /// Run `hook` after every chain check. The check may have fulfilled the
    /// execution by then.
    #[must_use]
    pub fn on_check_end(mut self, hook: impl Fn(&Execution<S>) + Send + Sync + 'static) -> Self {
        self.check_end = Some(Arc::new(hook));
        self
    }

    pub(crate) fn notify_execute_begin(&self, execution: &Execution<S>) {
        if let Some(hook) = &self.execute_begin {
            hook(execution);
        }
    }

    pub(crate) fn notify_execute_end(&self, execution: &Execution<S>) {
        if let Some(hook) = &self.execute_end {
            hook(execution);
        }
    }

    pub(crate) fn notify_check_begin(&self, execution: &Execution<S>) {
        if let Some(hook) = &self.check_begin {
            hook(execution);
        }
    }

    pub(crate) fn notify_check_end(&self, execution: &Execution<S>) {
        if let Some(hook) = &self.check_end {
            hook(execution);
        }
    }
}

impl<S: Subject> Default for WaitHooks<S> {
    fn default() -> Self {
        Self {
            execute_begin: None,
            execute_end: None,
            check_begin: None,
            check_end: None,
        }
    }
}

impl<S: Subject> Clone for WaitHooks<S> {
    fn clone(&self) -> Self {
        Self {
            execute_begin: self.execute_begin.clone(),
            execute_end: self.execute_end.clone(),
            check_begin: self.check_begin.clone(),
            check_end: self.check_end.clone(),
        }
    }
}

impl<S: Subject> fmt::Debug for WaitHooks<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHooks")
            .field("execute_begin", &self.execute_begin.is_some())
            .field("execute_end", &self.execute_end.is_some())
            .field("check_begin", &self.check_begin.is_some())
            .field("check_end", &self.check_end.is_some())
            .finish()
    }
}

// ============================================================================
// Core
// ============================================================================

/// Shared internals behind every [`Waiter`] clone and every expression
/// rooted on it.
pub(crate) struct WaiterCore<S: Subject> {
    clock: Arc<dyn Clock>,
    timers: Arc<dyn TimerBackend>,
    observers: Arc<ScopeObservers<S>>,
    hooks: Mutex<WaitHooks<S>>,
    default_timeout: Duration,
    next_execution_id: AtomicU64,
}

impl<S: Subject> WaiterCore<S> {
    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn timer_backend(&self) -> &Arc<dyn TimerBackend> {
        &self.timers
    }

    pub(crate) fn observers(&self) -> &ScopeObservers<S> {
        &self.observers
    }

    /// The hooks as currently configured. Events fired from one snapshot
    /// stay paired even if the hooks are replaced mid-check.
    pub(crate) fn hooks_snapshot(&self) -> WaitHooks<S> {
        lock(&self.hooks).clone()
    }

    pub(crate) fn next_execution_id(&self) -> u64 {
        self.next_execution_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run `expression` to fulfillment: prepare a fresh execution, fire the
    /// execute hooks around its lifetime, and wait on its memoized result.
    pub(crate) async fn execute_expression(
        engine: Arc<Self>,
        expression: Expression<S>,
    ) -> WaitResult<S> {
        let hooks = engine.hooks_snapshot();
        let execution = Execution::new(engine, expression);
        hooks.notify_execute_begin(&execution);
        let result = match execution.start() {
            Ok(()) => execution.outcome().wait().await,
            Err(error) => Err(error),
        };
        hooks.notify_execute_end(&execution);
        result
    }

    /// Run `expression` through a single immediate check.
    pub(crate) fn execute_expression_once(
        engine: Arc<Self>,
        expression: Expression<S>,
    ) -> WaitResult<S> {
        let hooks = engine.hooks_snapshot();
        let execution = Execution::new(engine, expression);
        hooks.notify_execute_begin(&execution);
        let result = execution.run_once();
        hooks.notify_execute_end(&execution);
        result
    }
}

impl<S: Subject> fmt::Debug for WaiterCore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaiterCore")
            .field("default_timeout", &self.default_timeout)
            .field("observed_scopes", &self.observers.observed_scope_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Waiter
// ============================================================================

/// Front door of the engine.
///
/// Chains are built on a waiter through the [`Chainable`] verbs; embedders
/// feed change signals for a scope into [`run_checks`](Self::run_checks) and
/// [`run_checks_deferred`](Self::run_checks_deferred), directly or through
/// the [`ScopeBinding`] installed at build time. Clones share one engine.
pub struct Waiter<S: Subject> {
    core: Arc<WaiterCore<S>>,
}

impl<S: Subject> Waiter<S> {
    /// An engine over wall time and spawned tokio sleeps, with no change
    /// listener binding. Scope changes must then be fed in by hand. Awaited
    /// runs arm their timers on the ambient tokio runtime;
    /// [`execute_once`](crate::Expression::execute_once) arms nothing and
    /// needs none.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring an engine.
    #[must_use]
    pub fn builder() -> WaiterBuilder<S> {
        WaiterBuilder::new()
    }

    /// Timeout applied to nodes rooted directly on this waiter.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.core.default_timeout
    }

    /// Number of scopes currently under change observation.
    #[must_use]
    pub fn observed_scope_count(&self) -> usize {
        self.core.observers.observed_scope_count()
    }

    /// Replace the lifecycle hooks. Events already being fired finish on
    /// the hooks they started with.
    pub fn set_hooks(&self, hooks: WaitHooks<S>) {
        *lock(&self.core.hooks) = hooks;
    }

    /// Re-check every pending execution observing `scope`, now. A scope
    /// nobody observes is a no-op.
    pub fn run_checks(&self, scope: &S::Scope) {
        self.core.observers.run_checks(scope);
    }

    /// Record a change for `scope` and schedule one coalesced re-check, so
    /// a burst of changes costs a single walk per execution.
    pub fn run_checks_deferred(&self, scope: &S::Scope) {
        self.core.observers.run_checks_deferred(scope);
    }

    /// Flush a pending deferred re-check for `scope`, if any.
    pub fn drain_deferrals(&self, scope: &S::Scope) {
        self.core.observers.drain_deferrals(scope);
    }
}

impl<S: Subject> Chainable<S> for Waiter<S> {
    fn chain_node(
        &self,
        step: Arc<dyn Step<S>>,
        timeout: Option<Duration>,
        override_start: Option<StartTimeOverride>,
    ) -> Expression<S> {
        Expression::new_node(
            Arc::clone(&self.core),
            None,
            step,
            timeout.unwrap_or(self.core.default_timeout),
            override_start,
        )
    }
}

impl<S: Subject> Default for Waiter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Subject> Clone for Waiter<S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S: Subject> fmt::Debug for Waiter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("default_timeout", &self.core.default_timeout)
            .field("observed_scopes", &self.observed_scope_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Configures and builds a [`Waiter`].
pub struct WaiterBuilder<S: Subject> {
    clock: Option<Arc<dyn Clock>>,
    timers: Option<Arc<dyn TimerBackend>>,
    binding: Option<Arc<dyn ScopeBinding<S>>>,
    hooks: WaitHooks<S>,
    default_timeout: Duration,
}

impl<S: Subject> WaiterBuilder<S> {
    fn new() -> Self {
        Self {
            clock: None,
            timers: None,
            binding: None,
            hooks: WaitHooks::default(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Clock executions read start and check times from. Defaults to
    /// [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Backend deadline and coalescing timers are armed on. Defaults to
    /// [`TokioBackend`].
    #[must_use]
    pub fn timer_backend(mut self, backend: Arc<dyn TimerBackend>) -> Self {
        self.timers = Some(backend);
        self
    }

    /// Binding that installs change listeners on observed scopes. Defaults
    /// to [`NullBinding`].
    #[must_use]
    pub fn binding(mut self, binding: Arc<dyn ScopeBinding<S>>) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Initial lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: WaitHooks<S>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Timeout for nodes rooted directly on the waiter.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Apply settings loaded from a [`WaiterConfig`].
    #[must_use]
    pub fn config(mut self, config: &WaiterConfig) -> Self {
        self.default_timeout = config.default_timeout();
        self
    }

    /// Build the engine.
    #[must_use]
    pub fn build(self) -> Waiter<S> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let timers = self.timers.unwrap_or_else(|| Arc::new(TokioBackend::new()));
        let binding = self
            .binding
            .unwrap_or_else(|| Arc::new(NullBinding::new()));
        let observers = ScopeObservers::new(Arc::clone(&timers), binding);
        Waiter {
            core: Arc::new(WaiterCore {
                clock,
                timers,
                observers,
                hooks: Mutex::new(self.hooks),
                default_timeout: self.default_timeout,
                next_execution_id: AtomicU64::new(0),
            }),
        }
    }
}

impl<S: Subject> Default for WaiterBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Subject> fmt::Debug for WaiterBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaiterBuilder")
            .field("default_timeout", &self.default_timeout)
            .field("custom_clock", &self.clock.is_some())
            .field("custom_timers", &self.timers.is_some())
            .field("custom_binding", &self.binding.is_some())
            .finish_non_exhaustive()
    }
}
