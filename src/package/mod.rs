// src/package/mod.rs

//! Per-environment package identity and load pipeline.
//!
//! - [`environment`] defines the build environment tuple and package keys.
//! - [`state`] holds the ordered [`LoadState`] and the readiness value.
//! - [`distinct`] is the [`DistinctPackage`] node stored in the caravan.

pub mod distinct;
pub mod environment;
pub mod state;

pub use distinct::DistinctPackage;
pub use environment::Environment;
pub use state::{LoadState, Readiness};
