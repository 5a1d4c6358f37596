// src/engine/mod.rs

//! Loader engine: drives distinct packages through their load pipeline.
//!
//! - [`loader`] holds the public [`Loader`] handle and the state it shares
//!   with running transitions.
//! - [`context`] defines the per-caller [`LoaderContext`].
//! - [`runtime`] is the dispatch loop consuming [`LoadEvent`]s.
//! - [`transitions`] implements the body of each pipeline step.

use std::fmt;

use crate::hash::Hash;

pub mod context;
pub mod loader;
pub mod runtime;
pub mod transitions;

pub use context::LoaderContext;
pub use loader::Loader;

/// Identity of a loader context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub(crate) u64);

impl ContextId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Why a package was put on the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventReason {
    /// First request for the package.
    Created,
    /// A transition finished and the package has more to do.
    Advanced,
    /// The package or one of its dependencies changed.
    Invalidated,
}

/// A state-change event: "look at this package again".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadEvent {
    pub key: Hash,
    pub reason: EventReason,
}

impl LoadEvent {
    pub fn new(key: Hash, reason: EventReason) -> Self {
        Self { key, reason }
    }
}

/// Tunables for a [`Loader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Capacity of the event channel feeding the dispatch loop.
    pub event_buffer: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { event_buffer: 64 }
    }
}
