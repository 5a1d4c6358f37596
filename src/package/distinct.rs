// src/package/distinct.rs

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::engine::ContextId;
use crate::errors::LoadFailure;
use crate::hash::Hash;
use crate::package::environment::Environment;
use crate::package::state::{LoadState, Readiness};
use crate::source::{Manifest, TypeInfo};
use crate::types::Diagnostic;

/// One package's analysis state under one build environment.
///
/// The load state lives in the readiness gate (a `watch` channel), so every
/// transition wakes waiters. Everything else sits behind the node's own lock,
/// which is always taken after the caravan lock and never before it.
pub struct DistinctPackage {
    key: Hash,
    abs_path: PathBuf,
    environment: Arc<Environment>,
    gate: watch::Sender<Readiness>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    manifest: Option<Arc<Manifest>>,
    manifest_stale: bool,
    diagnostics: BTreeMap<PathBuf, Vec<Diagnostic>>,
    owners: HashSet<ContextId>,
    type_info: Option<TypeInfo>,
    failure: Option<LoadFailure>,
    generation: u64,
    in_flight: bool,
}

/// Permission to run the transition out of `from`, issued by
/// [`DistinctPackage::begin_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub from: LoadState,
    pub generation: u64,
}

/// Results a transition body hands back for atomic application.
#[derive(Default)]
pub(crate) struct TransitionOutput {
    pub manifest: Option<Arc<Manifest>>,
    pub diagnostics: Vec<Diagnostic>,
    pub type_info: Option<TypeInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Finish {
    /// The node is not terminal and should receive another event.
    pub requeue: bool,
    /// The node just became terminal (done or failed).
    pub terminal: bool,
    /// The node was invalidated while the transition ran; its output was dropped.
    pub discarded: bool,
}

impl DistinctPackage {
    pub(crate) fn new(key: Hash, abs_path: PathBuf, environment: Arc<Environment>) -> Self {
        let (gate, _) = watch::channel(Readiness::queued());
        Self {
            key,
            abs_path,
            environment,
            gate,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn key(&self) -> Hash {
        self.key
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn readiness(&self) -> Readiness {
        *self.gate.borrow()
    }

    pub fn state(&self) -> LoadState {
        self.readiness().state
    }

    pub fn is_terminal(&self) -> bool {
        self.readiness().is_terminal()
    }

    /// True iff the current state is strictly past `threshold`.
    pub fn check_ready(&self, threshold: LoadState) -> bool {
        self.readiness().is_past(threshold)
    }

    /// Resolve once the state is strictly past `threshold`.
    ///
    /// Resolves with the failure instead if the package stops advancing, so
    /// dependents are never left waiting on a dead node.
    pub async fn wait_until_ready(&self, threshold: LoadState) -> Result<(), LoadFailure> {
        let mut rx = self.gate.subscribe();
        let readiness = *rx
            .wait_for(|r| r.failed || r.is_past(threshold))
            .await
            .map_err(|_| LoadFailure::Internal("readiness gate closed".to_string()))?;

        if readiness.failed {
            return Err(self.failure().unwrap_or_else(|| {
                LoadFailure::Internal(format!("{} failed", self.abs_path.display()))
            }));
        }
        Ok(())
    }

    pub fn failure(&self) -> Option<LoadFailure> {
        self.inner.lock().failure.clone()
    }

    /// Bumped by every effective invalidation.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn manifest(&self) -> Option<Arc<Manifest>> {
        self.inner.lock().manifest.clone()
    }

    pub fn manifest_stale(&self) -> bool {
        self.inner.lock().manifest_stale
    }

    pub fn type_info(&self) -> Option<TypeInfo> {
        self.inner.lock().type_info.clone()
    }

    /// Accumulated diagnostics keyed by file.
    pub fn diagnostics(&self) -> BTreeMap<PathBuf, Vec<Diagnostic>> {
        self.inner.lock().diagnostics.clone()
    }

    pub fn has_errors(&self) -> bool {
        self.inner
            .lock()
            .diagnostics
            .values()
            .flatten()
            .any(Diagnostic::is_error)
    }

    pub(crate) fn add_owners(&self, owners: &[ContextId]) {
        self.inner.lock().owners.extend(owners.iter().copied());
    }

    pub(crate) fn remove_owner(&self, owner: ContextId) -> bool {
        self.inner.lock().owners.remove(&owner)
    }

    pub fn owners(&self) -> Vec<ContextId> {
        self.inner.lock().owners.iter().copied().collect()
    }

    pub fn owner_count(&self) -> usize {
        self.inner.lock().owners.len()
    }

    /// Reset to `unloaded`, dropping diagnostics, type information and any
    /// failure. A package that never got past `queued` has nothing to reset
    /// unless its scan failed, in which case it is re-queued for a new scan.
    ///
    /// `manifest_changed` marks the file manifest for a re-read before the
    /// next load. Returns whether anything was reset.
    pub(crate) fn invalidate(&self, manifest_changed: bool) -> bool {
        let mut inner = self.inner.lock();
        let current = *self.gate.borrow();

        if current.state == LoadState::Queued && !current.failed {
            return false;
        }

        inner.generation += 1;
        inner.diagnostics.clear();
        inner.type_info = None;
        inner.failure = None;
        if manifest_changed {
            inner.manifest_stale = true;
        }

        let state = if current.state == LoadState::Queued {
            LoadState::Queued
        } else {
            LoadState::Unloaded
        };
        self.gate.send_modify(|r| {
            r.state = state;
            r.failed = false;
        });

        debug!(
            key = %self.key,
            path = %self.abs_path.display(),
            generation = inner.generation,
            %state,
            "package invalidated"
        );
        true
    }

    /// Claim the single in-flight transition slot.
    ///
    /// Returns `None` when the package is terminal or a transition is
    /// already running; the running one re-enqueues on completion.
    pub(crate) fn begin_transition(&self) -> Option<Ticket> {
        let mut inner = self.inner.lock();
        let current = *self.gate.borrow();

        if current.is_terminal() {
            trace!(key = %self.key, state = %current.state, "event for terminal package ignored");
            return None;
        }
        if inner.in_flight {
            trace!(key = %self.key, state = %current.state, "transition already in flight");
            return None;
        }

        inner.in_flight = true;
        Some(Ticket {
            from: current.state,
            generation: inner.generation,
        })
    }

    /// Apply a transition's outcome, unless the package was invalidated
    /// while it ran.
    pub(crate) fn finish_transition(
        &self,
        ticket: Ticket,
        outcome: Result<TransitionOutput, LoadFailure>,
    ) -> Finish {
        let mut inner = self.inner.lock();
        inner.in_flight = false;

        if ticket.generation != inner.generation {
            debug!(
                key = %self.key,
                from = %ticket.from,
                "package invalidated during transition; discarding result"
            );
            return Finish {
                requeue: true,
                terminal: false,
                discarded: true,
            };
        }

        match outcome {
            Ok(output) => {
                if let Some(manifest) = output.manifest {
                    inner.manifest = Some(manifest);
                    inner.manifest_stale = false;
                }
                for diagnostic in output.diagnostics {
                    inner
                        .diagnostics
                        .entry(diagnostic.file.clone())
                        .or_default()
                        .push(diagnostic);
                }
                if let Some(info) = output.type_info {
                    inner.type_info = Some(info);
                }
                if let Some(next) = ticket.from.next() {
                    self.gate.send_modify(|r| r.state = next);
                }
            }
            Err(failure) => {
                inner.failure = Some(failure);
                self.gate.send_modify(|r| r.failed = true);
            }
        }

        let terminal = self.gate.borrow().is_terminal();
        Finish {
            requeue: !terminal,
            terminal,
            discarded: false,
        }
    }
}

impl fmt::Debug for DistinctPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistinctPackage")
            .field("key", &self.key)
            .field("abs_path", &self.abs_path)
            .field("environment", &self.environment)
            .field("readiness", &self.readiness())
            .finish_non_exhaustive()
    }
}
