// src/dag/node.rs

//! Arena node stored inside a [`Caravan`](super::Caravan).

use std::collections::HashSet;

use crate::hash::Hash;

/// One element plus its edge sets.
///
/// Edges are stored as key sets rather than references, so the arena never
/// contains ownership cycles even when weak edges form graph cycles.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    pub(crate) element: T,
    /// Nodes with a strong edge pointing at this one.
    pub(crate) ascendants: HashSet<Hash>,
    /// Nodes this one has a strong edge to.
    pub(crate) descendants: HashSet<Hash>,
    pub(crate) weak_ascendants: HashSet<Hash>,
    pub(crate) weak_descendants: HashSet<Hash>,
}

impl<T> Node<T> {
    pub(crate) fn new(element: T) -> Self {
        Self {
            element,
            ascendants: HashSet::new(),
            descendants: HashSet::new(),
            weak_ascendants: HashSet::new(),
            weak_descendants: HashSet::new(),
        }
    }
}
