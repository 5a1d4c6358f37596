// tests/caravan_properties.rs
//
// Random connect sequences checked against a petgraph model of the same
// strong edges.

use std::collections::HashMap;

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use proptest::prelude::*;

use caravan::dag::{Caravan, WalkDirection};
use caravan::errors::CaravanError;
use caravan::hash::Hash;

fn key(n: usize) -> Hash {
    Hash::from_raw(n as u64 + 1)
}

fn edges_strategy(max_nodes: usize) -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2..=max_nodes).prop_flat_map(|n| {
        (
            Just(n),
            proptest::collection::vec((0..n, 0..n), 0..(n * 3)),
        )
    })
}

proptest! {
    #[test]
    fn connect_matches_reachability_model((n, attempts) in edges_strategy(10)) {
        let caravan: Caravan<usize> = Caravan::new();
        let mut model: DiGraph<usize, ()> = DiGraph::new();
        let mut index: HashMap<usize, NodeIndex> = HashMap::new();
        for i in 0..n {
            caravan.insert(key(i), i);
            index.insert(i, model.add_node(i));
        }

        for (from, to) in attempts {
            let (a, b) = (index[&from], index[&to]);
            let existing = model.contains_edge(a, b);
            let closes_cycle = !existing && has_path_connecting(&model, b, a, None);
            let edges_before = caravan.strong_edge_count();

            match caravan.connect(key(from), key(to)) {
                Ok(()) => {
                    prop_assert!(!closes_cycle, "accepted {from}->{to} which closes a cycle");
                    if !existing {
                        model.add_edge(a, b, ());
                    }
                }
                Err(CaravanError::Cycle { path }) => {
                    prop_assert!(closes_cycle, "rejected {from}->{to} which is acyclic");
                    prop_assert_eq!(path.first().copied(), Some(key(from)));
                    prop_assert_eq!(path.last().copied(), Some(key(from)));
                    prop_assert_eq!(caravan.strong_edge_count(), edges_before);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }

        prop_assert!(!is_cyclic_directed(&model));
        prop_assert_eq!(caravan.strong_edge_count(), model.edge_count());

        let mut roots: Vec<Hash> = caravan.roots();
        roots.sort();
        let mut expected: Vec<Hash> = (0..n)
            .filter(|i| {
                model
                    .neighbors_directed(index[i], petgraph::Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(key)
            .collect();
        expected.sort();
        prop_assert_eq!(roots, expected);
    }

    #[test]
    fn walk_down_visits_parents_first((n, attempts) in edges_strategy(10)) {
        let caravan: Caravan<usize> = Caravan::new();
        for i in 0..n {
            caravan.insert(key(i), i);
        }
        for (from, to) in attempts {
            let _ = caravan.connect(key(from), key(to));
        }

        let mut order = Vec::new();
        caravan.walk(WalkDirection::Down, |_, v| order.push(*v));
        prop_assert_eq!(order.len(), n);

        let position: HashMap<usize, usize> =
            order.iter().enumerate().map(|(pos, v)| (*v, pos)).collect();
        for i in 0..n {
            for child in caravan.descendants(key(i)).unwrap_or_default() {
                let child = (child.raw() - 1) as usize;
                prop_assert!(position[&i] < position[&child]);
            }
        }
    }

    #[test]
    fn reinsert_never_changes_the_graph((n, attempts) in edges_strategy(8)) {
        let caravan: Caravan<usize> = Caravan::new();
        for i in 0..n {
            caravan.insert(key(i), i);
        }
        for (from, to) in &attempts {
            let _ = caravan.connect(key(*from), key(*to));
        }
        let edges = caravan.strong_edge_count();
        let roots = caravan.root_count();

        for i in 0..n {
            prop_assert!(!caravan.insert(key(i), i + 100));
            let (value, inserted) = caravan.get_or_insert_with(key(i), || i + 200);
            prop_assert!(!inserted);
            prop_assert_eq!(value, i);
        }
        prop_assert_eq!(caravan.strong_edge_count(), edges);
        prop_assert_eq!(caravan.root_count(), roots);
        prop_assert_eq!(caravan.len(), n);
    }
}
