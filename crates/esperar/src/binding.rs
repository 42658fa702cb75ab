//! Change-signal plumbing between an embedder's scopes and the engine.
//!
//! The engine never watches anything itself: a [`ScopeBinding`] installs
//! listeners on whatever the embedder's scopes are (documents, directories,
//! topics) and those listeners report through a [`ChangeSink`]. Listener
//! lifetime is reference-counted per scope by the observation layer, so a
//! binding only ever sees one `install` and one `remove` per observed
//! stretch.

use std::fmt;
use std::sync::Weak;

use crate::observer::ScopeObservers;
use crate::subject::Subject;

/// Installs and removes change listeners for observed scopes.
///
/// `install` is called when the first execution starts observing a scope,
/// `remove` when the last one stops. Both run with engine locks held:
/// implementations must return quickly and must not call back into the
/// engine synchronously. The intended shape is to store the sink and invoke
/// it from listener callbacks later.
pub trait ScopeBinding<S: Subject>: Send + Sync + fmt::Debug {
    /// Install change listeners for `scope`, reporting into `sink`.
    fn install(&self, scope: &S::Scope, sink: ChangeSink<S>);

    /// Remove the listeners previously installed for `scope`.
    fn remove(&self, scope: &S::Scope);

    /// Whether `scope` can still deliver change signals. Observing a dead
    /// scope skips listener installation; deadline timers still run.
    fn is_alive(&self, _scope: &S::Scope) -> bool {
        true
    }
}

/// A binding that never installs listeners.
///
/// Executions under it are woken by deadline timers and the engine's manual
/// check entry points only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBinding;

impl NullBinding {
    /// The inert binding.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S: Subject> ScopeBinding<S> for NullBinding {
    fn install(&self, _scope: &S::Scope, _sink: ChangeSink<S>) {}

    fn remove(&self, _scope: &S::Scope) {}
}

/// Where listener code reports scope changes.
///
/// Cloneable and detached from the engine's lifetime: a sink outliving its
/// engine delivers into nothing.
pub struct ChangeSink<S: Subject> {
    registry: Weak<ScopeObservers<S>>,
    scope: S::Scope,
}

impl<S: Subject> ChangeSink<S> {
    pub(crate) fn new(registry: Weak<ScopeObservers<S>>, scope: S::Scope) -> Self {
        Self { registry, scope }
    }

    /// The scope this sink reports for.
    #[must_use]
    pub fn scope(&self) -> &S::Scope {
        &self.scope
    }

    /// Report a change: every execution observing the scope re-checks now.
    pub fn notify(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.run_checks(&self.scope);
        }
    }

    /// Report a change for the next coalescing tick: any number of deferred
    /// reports before the tick collapse into one re-check per execution.
    pub fn notify_deferred(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.run_checks_deferred(&self.scope);
        }
    }
}

impl<S: Subject> Clone for ChangeSink<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<S: Subject> fmt::Debug for ChangeSink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSink")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testutil::{DocId, TestNode};

    #[test]
    fn test_detached_sink_is_inert() {
        let sink = ChangeSink::<TestNode>::new(Weak::new(), DocId(3));
        sink.notify();
        sink.notify_deferred();
        assert_eq!(sink.scope(), &DocId(3));
    }

    #[test]
    fn test_sink_clones_share_the_scope() {
        let sink = ChangeSink::<TestNode>::new(Weak::new(), DocId(9));
        let cloned = sink.clone();
        assert_eq!(cloned.scope(), sink.scope());
    }
}
