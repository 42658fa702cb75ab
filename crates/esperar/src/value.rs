//! The running value threaded through a check.
//!
//! Every step receives the previous step's output and produces the next one.
//! A value is nothing, a single subject, or a list of subjects; lists are
//! shared immutably so cloning a value never copies subjects.

use std::collections::HashSet;
use std::slice;
use std::sync::Arc;

use crate::subject::Subject;

/// Output of a step and input to the next: nothing, one subject, or many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<S: Subject> {
    /// No result. The initial value of every check, and what lookups produce
    /// when nothing matches.
    None,
    /// A single subject.
    One(S),
    /// A list of subjects. Stays a list even when empty, so cardinality
    /// checks can distinguish "no list" from "empty list" sources.
    Many(Arc<[S]>),
}

impl<S: Subject> Value<S> {
    /// The subjects as a slice (`None` is an empty slice).
    #[must_use]
    pub fn as_slice(&self) -> &[S] {
        match self {
            Self::None => &[],
            Self::One(subject) => slice::from_ref(subject),
            Self::Many(list) => list,
        }
    }

    /// Number of subjects carried.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::One(_) => 1,
            Self::Many(list) => list.len(),
        }
    }

    /// Whether no subject is carried. An empty list counts as empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The first subject, if any.
    #[must_use]
    pub fn first(&self) -> Option<&S> {
        self.as_slice().first()
    }

    /// Iterate over the carried subjects.
    pub fn iter(&self) -> slice::Iter<'_, S> {
        self.as_slice().iter()
    }

    /// Add the owning scope of every carried subject to `scopes`.
    pub fn collect_scopes(&self, scopes: &mut HashSet<S::Scope>) {
        for subject in self.iter() {
            scopes.insert(subject.scope());
        }
    }
}

impl<S: Subject> Default for Value<S> {
    fn default() -> Self {
        Self::None
    }
}

impl<S: Subject> From<S> for Value<S> {
    fn from(subject: S) -> Self {
        Self::One(subject)
    }
}

impl<S: Subject> From<Option<S>> for Value<S> {
    fn from(subject: Option<S>) -> Self {
        subject.map_or(Self::None, Self::One)
    }
}

impl<S: Subject> From<Vec<S>> for Value<S> {
    fn from(list: Vec<S>) -> Self {
        Self::Many(Arc::from(list))
    }
}

impl<'a, S: Subject> IntoIterator for &'a Value<S> {
    type Item = &'a S;
    type IntoIter = slice::Iter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
