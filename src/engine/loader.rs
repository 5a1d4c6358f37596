// src/engine/loader.rs

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use crate::dag::Caravan;
use crate::engine::context::LoaderContext;
use crate::engine::runtime::Dispatcher;
use crate::engine::{ContextId, EventReason, LoadEvent, LoaderOptions};
use crate::errors::{CaravanError, LoadFailure, Result};
use crate::hash::Hash;
use crate::package::{DistinctPackage, Environment};
use crate::source::Collaborators;
use crate::types::Diagnostic;

/// State shared between the [`Loader`] handle, the dispatch loop and every
/// running transition.
pub(crate) struct Shared {
    pub(crate) caravan: Caravan<Arc<DistinctPackage>>,
    pub(crate) collaborators: Collaborators,
    contexts: Mutex<HashMap<ContextId, Arc<LoaderContext>>>,
    next_context: AtomicU64,
    events: mpsc::Sender<LoadEvent>,
    shut_down: AtomicBool,
    stop: Notify,
}

impl Shared {
    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Resolves once [`Loader::shutdown`] has been called.
    pub(crate) async fn stopped(&self) {
        let notified = self.stop.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_shut_down() {
            return;
        }
        notified.await;
    }

    pub(crate) async fn enqueue(&self, event: LoadEvent) {
        if self.is_shut_down() {
            debug!(key = %event.key, reason = ?event.reason, "loader shut down; event dropped");
            return;
        }
        if self.events.send(event).await.is_err() {
            debug!(key = %event.key, "dispatch loop gone; event dropped");
        }
    }

    /// Find or create the package for `abs_path` under `environment`.
    ///
    /// Only the caller that actually inserted the node schedules its first
    /// event; everyone else gets the existing node.
    pub(crate) async fn package_for(
        &self,
        abs_path: &Path,
        environment: &Arc<Environment>,
        owners: &[ContextId],
    ) -> (Arc<DistinctPackage>, bool) {
        let key = environment.package_key(abs_path);
        let (pkg, inserted) = self.caravan.get_or_insert_with(key, || {
            Arc::new(DistinctPackage::new(
                key,
                abs_path.to_path_buf(),
                Arc::clone(environment),
            ))
        });
        pkg.add_owners(owners);

        if inserted {
            debug!(%key, path = %abs_path.display(), env = %environment, "created package");
            self.enqueue(LoadEvent::new(key, EventReason::Created)).await;
        }
        (pkg, inserted)
    }

    /// Add `owners` to every package reachable from `keys`.
    pub(crate) fn propagate_owners(&self, keys: &[Hash], owners: &[ContextId]) {
        if owners.is_empty() {
            return;
        }
        for (_, pkg) in self.caravan.reachable(keys) {
            pkg.add_owners(owners);
        }
    }

    fn context(&self, id: ContextId) -> Result<Arc<LoaderContext>> {
        self.contexts
            .lock()
            .get(&id)
            .cloned()
            .ok_or(CaravanError::UnknownContext(id))
    }

    /// Packages reachable from a context's roots over strong and weak edges.
    fn packages_of(&self, ctx: &LoaderContext) -> Vec<Arc<DistinctPackage>> {
        let mut pkgs: Vec<_> = self
            .caravan
            .reachable(&ctx.roots())
            .into_iter()
            .map(|(_, pkg)| pkg)
            .collect();
        pkgs.sort_by(|a, b| a.abs_path().cmp(b.abs_path()));
        pkgs
    }

    fn is_settled(&self, ctx: &LoaderContext) -> bool {
        self.caravan
            .reachable(&ctx.roots())
            .iter()
            .all(|(_, pkg)| pkg.is_terminal())
    }

    /// Called whenever a package becomes done or failed.
    pub(crate) fn package_settled(&self, pkg: &DistinctPackage) {
        let contexts: Vec<Arc<LoaderContext>> = self
            .contexts
            .lock()
            .values()
            .filter(|ctx| ctx.environment() == pkg.environment())
            .cloned()
            .collect();

        for ctx in contexts {
            if self.is_settled(&ctx) {
                debug!(ctx = %ctx.id(), env = %ctx.environment(), "context settled");
                ctx.settled.notify_waiters();
            }
        }
    }
}

/// Handle to the incremental package loader.
///
/// Cloning is cheap; all clones drive the same graph. Dropping the last
/// handle does not stop the dispatch loop, call [`Loader::shutdown`].
#[derive(Clone)]
pub struct Loader {
    shared: Arc<Shared>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("packages", &self.shared.caravan.len())
            .field("contexts", &self.shared.contexts.lock().len())
            .field("shut_down", &self.shared.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Create a loader and spawn its dispatch loop on the current tokio
    /// runtime.
    pub fn new(collaborators: Collaborators, options: LoaderOptions) -> Self {
        let (tx, rx) = mpsc::channel(options.event_buffer.max(1));
        let shared = Arc::new(Shared {
            caravan: Caravan::new(),
            collaborators,
            contexts: Mutex::new(HashMap::new()),
            next_context: AtomicU64::new(1),
            events: tx,
            shut_down: AtomicBool::new(false),
            stop: Notify::new(),
        });

        tokio::spawn(Dispatcher::new(Arc::clone(&shared), rx).run());
        Self { shared }
    }

    /// Open a context for `environment`.
    pub fn new_context(&self, environment: Environment) -> Result<ContextId> {
        if self.shared.is_shut_down() {
            return Err(CaravanError::ShutDown);
        }
        let id = ContextId(self.shared.next_context.fetch_add(1, Ordering::Relaxed));
        let ctx = Arc::new(LoaderContext::new(id, Arc::new(environment)));
        info!(ctx = %id, env = %ctx.environment(), "opened loader context");
        self.shared.contexts.lock().insert(id, ctx);
        Ok(id)
    }

    pub fn context(&self, ctx: ContextId) -> Option<Arc<LoaderContext>> {
        self.shared.contexts.lock().get(&ctx).cloned()
    }

    /// Start loading every package at or below `root`.
    ///
    /// Returns immediately with the keys of the root packages; use
    /// [`Loader::wait`] to block until they settle. When `root` holds no
    /// package directories it is loaded as a package itself, so the
    /// structural failure is recorded on a node.
    pub async fn load_directory(&self, ctx: ContextId, root: &Path) -> Result<Vec<Hash>> {
        if self.shared.is_shut_down() {
            return Err(CaravanError::ShutDown);
        }
        let context = self.shared.context(ctx)?;

        let scanner = Arc::clone(&self.shared.collaborators.scanner);
        let dir = root.to_path_buf();
        let dirs = tokio::task::spawn_blocking(move || scanner.package_dirs(&dir))
            .await
            .map_err(|e| CaravanError::Other(e.into()))?;
        let dirs = match dirs {
            Ok(dirs) if !dirs.is_empty() => dirs,
            Ok(_) => vec![root.to_path_buf()],
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot list package directories");
                vec![root.to_path_buf()]
            }
        };

        let mut keys = Vec::with_capacity(dirs.len());
        for dir in &dirs {
            let (pkg, _) = self
                .shared
                .package_for(dir, context.environment(), &[ctx])
                .await;
            keys.push(pkg.key());
        }
        context.add_roots(keys.iter().copied());
        self.shared.propagate_owners(&keys, &[ctx]);

        info!(
            ctx = %ctx,
            root = %root.display(),
            packages = keys.len(),
            "loading directory"
        );
        Ok(keys)
    }

    /// Block until every package reachable from the context's roots is done
    /// or failed.
    pub async fn wait(&self, ctx: ContextId) -> Result<()> {
        loop {
            let context = self.shared.context(ctx)?;
            let settled = context.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            if self.shared.is_settled(&context) {
                return Ok(());
            }
            if self.shared.is_shut_down() {
                return Err(CaravanError::ShutDown);
            }

            tokio::select! {
                _ = &mut settled => {}
                _ = self.shared.stopped() => return Err(CaravanError::ShutDown),
            }
        }
    }

    /// Visit accumulated diagnostics of every package reachable from the
    /// context, file by file, in path order.
    pub fn errors(
        &self,
        ctx: ContextId,
        mut visit: impl FnMut(&Path, &[Diagnostic]),
    ) -> Result<()> {
        let context = self.shared.context(ctx)?;
        for pkg in self.shared.packages_of(&context) {
            for (file, diagnostics) in pkg.diagnostics() {
                visit(&file, &diagnostics);
            }
        }
        Ok(())
    }

    /// Packages reachable from the context that stopped with a failure.
    pub fn failures(&self, ctx: ContextId) -> Result<Vec<(PathBuf, LoadFailure)>> {
        let context = self.shared.context(ctx)?;
        Ok(self
            .shared
            .packages_of(&context)
            .into_iter()
            .filter_map(|pkg| pkg.failure().map(|f| (pkg.abs_path().to_path_buf(), f)))
            .collect())
    }

    /// The package for `abs_path` in the context's environment, if known.
    pub fn package(
        &self,
        ctx: ContextId,
        abs_path: &Path,
    ) -> Result<Option<Arc<DistinctPackage>>> {
        let context = self.shared.context(ctx)?;
        let key = context.environment().package_key(abs_path);
        Ok(self.shared.caravan.find(key))
    }

    /// Every package reachable from the context, in path order.
    pub fn packages(&self, ctx: ContextId) -> Result<Vec<Arc<DistinctPackage>>> {
        let context = self.shared.context(ctx)?;
        Ok(self.shared.packages_of(&context))
    }

    /// Reset the packages at `path` (a package directory, or a file inside
    /// one) in every environment, together with everything that transitively
    /// depends on them, and schedule them again.
    ///
    /// Returns the keys that were reset.
    pub async fn invalidate(&self, path: &Path) -> Result<Vec<Hash>> {
        if self.shared.is_shut_down() {
            return Err(CaravanError::ShutDown);
        }

        let mut matched: Vec<Arc<DistinctPackage>> = self
            .shared
            .caravan
            .iter()
            .filter(|pkg| pkg.abs_path() == path)
            .collect();
        if matched.is_empty() {
            if let Some(parent) = path.parent() {
                matched = self
                    .shared
                    .caravan
                    .iter()
                    .filter(|pkg| pkg.abs_path() == parent)
                    .collect();
            }
        }

        let mut dependents = BTreeSet::new();
        for pkg in &matched {
            dependents.extend(self.shared.caravan.ancestors(pkg.key()));
        }

        let mut reset = Vec::new();
        for pkg in &matched {
            dependents.remove(&pkg.key());
            if pkg.invalidate(true) {
                reset.push(pkg.key());
            }
        }
        for key in dependents {
            if let Some(pkg) = self.shared.caravan.find(key) {
                if pkg.invalidate(false) {
                    reset.push(key);
                }
            }
        }

        info!(
            path = %path.display(),
            matched = matched.len(),
            reset = reset.len(),
            "invalidated packages"
        );

        for key in &reset {
            self.shared
                .enqueue(LoadEvent::new(*key, EventReason::Invalidated))
                .await;
        }
        Ok(reset)
    }

    /// Drop a context and its ownership of packages. Packages stay in the
    /// graph.
    pub fn release_context(&self, ctx: ContextId) -> bool {
        let Some(context) = self.shared.contexts.lock().remove(&ctx) else {
            return false;
        };
        for pkg in self.shared.caravan.iter() {
            pkg.remove_owner(ctx);
        }
        // Wake anyone still waiting so they observe the unknown context.
        context.settled.notify_waiters();
        debug!(ctx = %ctx, "released loader context");
        true
    }

    /// Stop accepting events and stop the dispatch loop. Idempotent and
    /// non-blocking; in-flight transitions finish but are not re-enqueued.
    pub fn shutdown(&self) {
        if self.shared.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("loader shutting down");
        self.shared.stop.notify_waiters();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_shut_down()
    }

    pub fn caravan(&self) -> &Caravan<Arc<DistinctPackage>> {
        &self.shared.caravan
    }
}
