// src/dag/caravan.rs

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::errors::{CaravanError, Result};
use crate::hash::Hash;

use super::node::Node;
use super::walk::{self, WalkDirection};

/// Forest of DAGs keyed by [`Hash`].
///
/// All state sits behind a single mutex. Mutations are rare compared to
/// lookups, and cycle detection on `connect` needs a consistent view of the
/// whole graph, so a coarse lock keeps check-then-mutate atomic.
///
/// Strong edges take part in cycle detection, root bookkeeping and walk
/// ordering. Weak edges are inventory only: they may form cycles and are
/// followed by [`Caravan::reachable`], nothing else.
#[derive(Debug)]
pub struct Caravan<T> {
    inner: Mutex<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    nodes: HashMap<Hash, Node<T>>,
    roots: HashSet<Hash>,
}

impl<T: Clone> Default for Caravan<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Caravan<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                nodes: HashMap::new(),
                roots: HashSet::new(),
            }),
        }
    }

    /// Add `element` as a new root under `key`.
    ///
    /// Returns `false` and changes nothing if `key` already exists.
    pub fn insert(&self, key: Hash, element: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.nodes.contains_key(&key) {
            return false;
        }
        inner.nodes.insert(key, Node::new(element));
        inner.roots.insert(key);
        trace!(%key, "caravan: inserted node");
        true
    }

    /// Create-or-find in one critical section.
    ///
    /// `make` only runs when `key` is new. The returned flag is `true` for
    /// exactly one caller per key.
    pub fn get_or_insert_with(&self, key: Hash, make: impl FnOnce() -> T) -> (T, bool) {
        let mut inner = self.inner.lock();
        if let Some(node) = inner.nodes.get(&key) {
            return (node.element.clone(), false);
        }
        let element = make();
        inner.nodes.insert(key, Node::new(element.clone()));
        inner.roots.insert(key);
        trace!(%key, "caravan: inserted node");
        (element, true)
    }

    /// Add a strong edge `from -> to`.
    ///
    /// Fails without mutating anything if either key is missing or if `to`
    /// already reaches `from` over strong edges. Connecting an existing edge
    /// is a no-op.
    pub fn connect(&self, from: Hash, to: Hash) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_present(from, to)?;

        if inner.nodes[&from].descendants.contains(&to) {
            return Ok(());
        }

        if let Some(mut path) = inner.strong_path(to, from) {
            path.insert(0, from);
            debug!(%from, %to, "caravan: rejected connect that would close a cycle");
            return Err(CaravanError::Cycle { path });
        }

        if let Some(node) = inner.nodes.get_mut(&from) {
            node.descendants.insert(to);
        }
        if let Some(node) = inner.nodes.get_mut(&to) {
            node.ascendants.insert(from);
        }
        inner.roots.remove(&to);
        trace!(%from, %to, "caravan: connected");
        Ok(())
    }

    /// Add a weak edge `from -> to` without cycle detection.
    pub fn weak_connect(&self, from: Hash, to: Hash) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_present(from, to)?;

        if let Some(node) = inner.nodes.get_mut(&from) {
            node.weak_descendants.insert(to);
        }
        if let Some(node) = inner.nodes.get_mut(&to) {
            node.weak_ascendants.insert(from);
        }
        trace!(%from, %to, "caravan: weakly connected");
        Ok(())
    }

    pub fn find(&self, key: Hash) -> Option<T> {
        self.inner.lock().nodes.get(&key).map(|n| n.element.clone())
    }

    pub fn contains(&self, key: Hash) -> bool {
        self.inner.lock().nodes.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root_count(&self) -> usize {
        self.inner.lock().roots.len()
    }

    pub fn roots(&self) -> Vec<Hash> {
        self.inner.lock().roots.iter().copied().collect()
    }

    pub fn is_root(&self, key: Hash) -> bool {
        self.inner.lock().roots.contains(&key)
    }

    pub fn strong_edge_count(&self) -> usize {
        self.inner.lock().nodes.values().map(|n| n.descendants.len()).sum()
    }

    pub fn weak_edge_count(&self) -> usize {
        self.inner
            .lock()
            .nodes
            .values()
            .map(|n| n.weak_descendants.len())
            .sum()
    }

    /// Direct strong descendants of `key`.
    pub fn descendants(&self, key: Hash) -> Option<Vec<Hash>> {
        let inner = self.inner.lock();
        inner
            .nodes
            .get(&key)
            .map(|n| n.descendants.iter().copied().collect())
    }

    /// Direct strong ascendants of `key`.
    pub fn ascendants(&self, key: Hash) -> Option<Vec<Hash>> {
        let inner = self.inner.lock();
        inner
            .nodes
            .get(&key)
            .map(|n| n.ascendants.iter().copied().collect())
    }

    pub fn weak_descendants(&self, key: Hash) -> Option<Vec<Hash>> {
        let inner = self.inner.lock();
        inner
            .nodes
            .get(&key)
            .map(|n| n.weak_descendants.iter().copied().collect())
    }

    /// Every node that transitively depends on `key` over strong edges,
    /// excluding `key` itself.
    pub fn ancestors(&self, key: Hash) -> Vec<Hash> {
        let inner = self.inner.lock();
        let mut seen: HashSet<Hash> = HashSet::new();
        let mut stack: Vec<Hash> = match inner.nodes.get(&key) {
            Some(node) => node.ascendants.iter().copied().collect(),
            None => return Vec::new(),
        };

        while let Some(next) = stack.pop() {
            if next == key || !seen.insert(next) {
                continue;
            }
            if let Some(node) = inner.nodes.get(&next) {
                stack.extend(node.ascendants.iter().copied());
            }
        }

        seen.into_iter().collect()
    }

    /// Elements reachable from `starts` over strong and weak edges,
    /// including the starts themselves. Unknown keys are skipped.
    pub fn reachable(&self, starts: &[Hash]) -> Vec<(Hash, T)> {
        let inner = self.inner.lock();
        let mut seen: HashSet<Hash> = HashSet::new();
        let mut stack: Vec<Hash> = starts.to_vec();
        let mut out = Vec::new();

        while let Some(key) = stack.pop() {
            if !seen.insert(key) {
                continue;
            }
            let Some(node) = inner.nodes.get(&key) else {
                continue;
            };
            out.push((key, node.element.clone()));
            stack.extend(node.descendants.iter().copied());
            stack.extend(node.weak_descendants.iter().copied());
        }

        out
    }

    /// Visit every node exactly once in strong-edge topological order.
    ///
    /// The order is computed under the lock; `visitor` runs after it is
    /// released, so it may call back into the caravan.
    pub fn walk(&self, direction: WalkDirection, mut visitor: impl FnMut(Hash, &T)) {
        let visits: Vec<(Hash, T)> = {
            let inner = self.inner.lock();
            walk::order(&inner.nodes, direction)
                .into_iter()
                .filter_map(|key| inner.nodes.get(&key).map(|n| (key, n.element.clone())))
                .collect()
        };

        for (key, element) in &visits {
            visitor(*key, element);
        }
    }

    /// Lazy, unordered, single-pass iteration over all elements.
    ///
    /// Keys are snapshotted up front; each element is fetched on demand.
    pub fn iter(&self) -> Iter<'_, T> {
        let keys: Vec<Hash> = self.inner.lock().nodes.keys().copied().collect();
        Iter {
            caravan: self,
            keys: keys.into_iter(),
        }
    }
}

impl<T> Inner<T> {
    fn ensure_present(&self, from: Hash, to: Hash) -> Result<()> {
        for key in [from, to] {
            if !self.nodes.contains_key(&key) {
                return Err(CaravanError::MissingNode(key));
            }
        }
        Ok(())
    }

    /// Depth-first search from `start` over strong descendants, returning the
    /// first path that ends at `target`.
    fn strong_path(&self, start: Hash, target: Hash) -> Option<Vec<Hash>> {
        let mut visited: HashSet<Hash> = HashSet::new();
        let mut path: Vec<Hash> = Vec::new();
        if self.dfs(start, target, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn dfs(
        &self,
        current: Hash,
        target: Hash,
        visited: &mut HashSet<Hash>,
        path: &mut Vec<Hash>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if visited.insert(current) {
            if let Some(node) = self.nodes.get(&current) {
                for next in &node.descendants {
                    if self.dfs(*next, target, visited, path) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }
}

/// Iterator returned by [`Caravan::iter`].
pub struct Iter<'a, T> {
    caravan: &'a Caravan<T>,
    keys: std::vec::IntoIter<Hash>,
}

impl<T: Clone> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        for key in self.keys.by_ref() {
            if let Some(element) = self.caravan.find(key) {
                return Some(element);
            }
        }
        None
    }
}
