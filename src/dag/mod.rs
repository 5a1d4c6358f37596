// src/dag/mod.rs

//! Generic forest-of-DAGs storage.
//!
//! - [`caravan`] holds the [`Caravan`] container: insert, strong/weak
//!   connect with cycle rejection, lookup and traversal.
//! - `node` defines the arena node with its edge key sets.
//! - [`walk`] computes topological visiting orders.

pub mod caravan;
mod node;
pub mod walk;

pub use caravan::{Caravan, Iter};
pub use walk::WalkDirection;
