//! Debounced, per-scope change observation.
//!
//! Executions blocked on a scope register here; change signals for the
//! scope wake them. Two zero-delay timers per scope keep the layer quiet
//! under churn: a coalescing timer folds any burst of deferred signals into
//! one re-check per execution, and a teardown timer removes listeners and
//! the observer itself one tick after the last execution unregisters, so a
//! scope that is re-observed immediately never sees its listeners churn.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::binding::{ChangeSink, ScopeBinding};
use crate::execution::ExecutionCore;
use crate::subject::Subject;
use crate::sync::lock;
use crate::timer::{Timer, TimerBackend};

struct ObserverState<S: Subject> {
    /// Registered executions by id. Dead entries are pruned on snapshot.
    executions: Vec<(u64, Weak<ExecutionCore<S>>)>,
    listeners_installed: bool,
    has_deferred_change: bool,
}

/// One scope's observation state and its coalescing and teardown timers.
struct ScopeObserver<S: Subject> {
    state: Mutex<ObserverState<S>>,
    coalesce: Timer,
    teardown: Timer,
}

/// The per-engine registry of scope observers.
///
/// The registry map lock serializes observer lifecycle and binding
/// install/remove calls; observer state locks are only ever taken under it
/// or on their own, and are always released before executions are checked.
pub(crate) struct ScopeObservers<S: Subject> {
    backend: Arc<dyn TimerBackend>,
    binding: Arc<dyn ScopeBinding<S>>,
    weak_self: Weak<ScopeObservers<S>>,
    observers: Mutex<HashMap<S::Scope, Arc<ScopeObserver<S>>>>,
}

/// Upgrade every live entry, dropping dead ones in place.
fn snapshot_live<S: Subject>(
    entries: &mut Vec<(u64, Weak<ExecutionCore<S>>)>,
) -> Vec<Arc<ExecutionCore<S>>> {
    let mut live = Vec::with_capacity(entries.len());
    entries.retain(|(_, weak)| match weak.upgrade() {
        Some(core) => {
            live.push(core);
            true
        }
        None => false,
    });
    live
}

impl<S: Subject> ScopeObservers<S> {
    pub(crate) fn new(
        backend: Arc<dyn TimerBackend>,
        binding: Arc<dyn ScopeBinding<S>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            backend,
            binding,
            weak_self: weak.clone(),
            observers: Mutex::new(HashMap::new()),
        })
    }

    fn make_observer(&self, scope: &S::Scope) -> Arc<ScopeObserver<S>> {
        let coalesce = {
            let registry = self.weak_self.clone();
            let scope = scope.clone();
            Timer::new(Duration::ZERO, Arc::clone(&self.backend), move || {
                if let Some(registry) = registry.upgrade() {
                    registry.run_checks(&scope);
                }
            })
        };
        let teardown = {
            let registry = self.weak_self.clone();
            let scope = scope.clone();
            Timer::new(Duration::ZERO, Arc::clone(&self.backend), move || {
                if let Some(registry) = registry.upgrade() {
                    registry.run_teardown(&scope);
                }
            })
        };
        Arc::new(ScopeObserver {
            state: Mutex::new(ObserverState {
                executions: Vec::new(),
                listeners_installed: false,
                has_deferred_change: false,
            }),
            coalesce,
            teardown,
        })
    }

    fn observer(&self, scope: &S::Scope) -> Option<Arc<ScopeObserver<S>>> {
        lock(&self.observers).get(scope).cloned()
    }

    /// Start waking `execution` on changes to `scope`. Re-registering the
    /// same execution is a no-op; any pending teardown is called off.
    pub(crate) fn register_execution(
        &self,
        scope: &S::Scope,
        id: u64,
        execution: Weak<ExecutionCore<S>>,
    ) {
        let mut map = lock(&self.observers);
        let observer = Arc::clone(
            map.entry(scope.clone())
                .or_insert_with(|| self.make_observer(scope)),
        );
        let mut state = lock(&observer.state);
        if !state.executions.iter().any(|(existing, _)| *existing == id) {
            state.executions.push((id, execution));
        }
        if !state.listeners_installed && self.binding.is_alive(scope) {
            let sink = ChangeSink::new(self.weak_self.clone(), scope.clone());
            self.binding.install(scope, sink);
            state.listeners_installed = true;
            tracing::debug!(scope = ?scope, "change listeners installed");
        }
        observer.teardown.cancel();
        tracing::trace!(scope = ?scope, execution = id, "execution observing scope");
    }

    /// Stop waking `execution` on changes to `scope`. When the last
    /// execution leaves, teardown is scheduled for the next tick rather
    /// than done inline.
    pub(crate) fn unregister_execution(&self, scope: &S::Scope, id: u64) {
        let map = lock(&self.observers);
        let Some(observer) = map.get(scope) else {
            return;
        };
        let mut state = lock(&observer.state);
        state.executions.retain(|(existing, _)| *existing != id);
        tracing::trace!(scope = ?scope, execution = id, "execution stopped observing scope");
        if state.executions.is_empty() {
            observer.teardown.reschedule();
        }
    }

    /// Teardown tick: drop the observer and its listeners unless an
    /// execution registered again since the tick was scheduled.
    fn run_teardown(&self, scope: &S::Scope) {
        let mut map = lock(&self.observers);
        let Some(observer) = map.get(scope).cloned() else {
            return;
        };
        let was_installed = {
            let mut state = lock(&observer.state);
            if !state.executions.is_empty() {
                return;
            }
            observer.coalesce.cancel();
            state.has_deferred_change = false;
            let was = state.listeners_installed;
            state.listeners_installed = false;
            was
        };
        map.remove(scope);
        if was_installed {
            self.binding.remove(scope);
        }
        tracing::debug!(scope = ?scope, "scope observer torn down");
    }

    /// Re-check every execution observing `scope` now. Clears any pending
    /// deferral first so a following tick does not double-check. Unobserved
    /// scopes are a no-op.
    pub(crate) fn run_checks(&self, scope: &S::Scope) {
        let Some(observer) = self.observer(scope) else {
            return;
        };
        let executions = {
            let mut state = lock(&observer.state);
            observer.coalesce.cancel();
            state.has_deferred_change = false;
            let live = snapshot_live(&mut state.executions);
            if live.is_empty() && state.executions.is_empty() {
                observer.teardown.reschedule();
            }
            live
        };
        tracing::trace!(scope = ?scope, executions = executions.len(), "running checks");
        for execution in executions {
            execution.check_tolerant();
        }
    }

    /// Record a deferred change for `scope` and make sure a coalescing tick
    /// is on the way. Any number of calls before the tick fold into one
    /// round of checks.
    pub(crate) fn run_checks_deferred(&self, scope: &S::Scope) {
        let Some(observer) = self.observer(scope) else {
            return;
        };
        let mut state = lock(&observer.state);
        state.has_deferred_change = true;
        observer.coalesce.schedule();
        tracing::trace!(scope = ?scope, "deferred change recorded");
    }

    /// Flush a pending deferral for `scope` immediately instead of waiting
    /// for its tick. A no-op when nothing is deferred.
    pub(crate) fn drain_deferrals(&self, scope: &S::Scope) {
        let Some(observer) = self.observer(scope) else {
            return;
        };
        let flagged = lock(&observer.state).has_deferred_change;
        if flagged {
            self.run_checks(scope);
        }
    }

    pub(crate) fn observed_scope_count(&self) -> usize {
        lock(&self.observers).len()
    }

    #[cfg(test)]
    pub(crate) fn observed_execution_count(&self, scope: &S::Scope) -> usize {
        self.observer(scope)
            .map_or(0, |observer| lock(&observer.state).executions.len())
    }
}
