// src/dag/walk.rs

//! Kahn-style traversal order over the strong edges of a caravan.

use std::collections::{HashMap, VecDeque};

use crate::hash::Hash;

use super::node::Node;

/// Direction of a [`Caravan::walk`](super::Caravan::walk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDirection {
    /// Roots first; a node is visited only after all its strong ascendants.
    Down,
    /// Leaves first; a node is visited only after all its strong descendants.
    Up,
}

/// Compute a visiting order for every node in `nodes`.
///
/// Every node appears exactly once. Because strong edges never form a cycle,
/// the queue always drains the whole arena.
pub(crate) fn order<T>(nodes: &HashMap<Hash, Node<T>>, direction: WalkDirection) -> Vec<Hash> {
    let mut pending: HashMap<Hash, usize> = HashMap::with_capacity(nodes.len());
    let mut queue: VecDeque<Hash> = VecDeque::new();

    for (key, node) in nodes {
        let incoming = match direction {
            WalkDirection::Down => node.ascendants.len(),
            WalkDirection::Up => node.descendants.len(),
        };
        if incoming == 0 {
            queue.push_back(*key);
        } else {
            pending.insert(*key, incoming);
        }
    }

    let mut visited = Vec::with_capacity(nodes.len());

    while let Some(key) = queue.pop_front() {
        visited.push(key);

        let Some(node) = nodes.get(&key) else {
            continue;
        };
        let next = match direction {
            WalkDirection::Down => &node.descendants,
            WalkDirection::Up => &node.ascendants,
        };

        for succ in next {
            if let Some(count) = pending.get_mut(succ) {
                *count -= 1;
                if *count == 0 {
                    pending.remove(succ);
                    queue.push_back(*succ);
                }
            }
        }
    }

    visited
}
