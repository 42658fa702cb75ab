//! Subject and scope identity traits.
//!
//! The engine is generic over the tree it observes. A [`Scope`] identifies an
//! observable subtree root (one document, one session, one partition of a
//! store) by value; a [`Subject`] is an addressable element within a scope
//! that steps take as input and produce as output. The engine never inspects
//! subjects beyond asking which scope owns them.

use std::fmt;
use std::hash::Hash;

/// Identity of an observable subtree root.
///
/// Scopes are value-identity keyed: the observer registry uses them as map
/// keys, so two handles naming the same subtree must compare equal. Handles
/// should be cheap to clone (an id, an `Arc`'d handle).
pub trait Scope: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// An addressable element within a [`Scope`].
///
/// Implementations are handles, not the observed data itself: cloning a
/// subject must not copy the underlying tree node.
pub trait Subject: Clone + fmt::Debug + Send + Sync + 'static {
    /// The scope type owning subjects of this kind.
    type Scope: Scope;

    /// The scope that owns this subject.
    ///
    /// Used after every successful step to decide which scopes the execution
    /// must observe for changes.
    fn scope(&self) -> Self::Scope;
}
