// src/engine/context.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::engine::ContextId;
use crate::hash::Hash;
use crate::package::Environment;

/// One caller's view of the loader: an environment plus the root packages
/// it asked for.
///
/// Contexts never own packages exclusively. A package reachable from two
/// contexts is shared and lists both as owners.
#[derive(Debug)]
pub struct LoaderContext {
    id: ContextId,
    environment: Arc<Environment>,
    roots: Mutex<BTreeSet<Hash>>,
    pub(crate) settled: Notify,
}

impl LoaderContext {
    pub(crate) fn new(id: ContextId, environment: Arc<Environment>) -> Self {
        Self {
            id,
            environment,
            roots: Mutex::new(BTreeSet::new()),
            settled: Notify::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn roots(&self) -> Vec<Hash> {
        self.roots.lock().iter().copied().collect()
    }

    pub(crate) fn add_roots(&self, keys: impl IntoIterator<Item = Hash>) {
        self.roots.lock().extend(keys);
    }
}
