// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::Loader;
use crate::fs::FileSystem;
use crate::watch::cache::FileCache;
use crate::watch::event_handler::{WatchEvent, process_file_change};

/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and invalidate packages whose source files
/// change. Every acted-on change is reported on `events_tx`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    loader: Loader,
    fs: Arc<dyn FileSystem>,
    extension: String,
    events_tx: mpsc::Sender<WatchEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let mut cache = FileCache::new(Arc::clone(&fs));
    if let Err(err) = cache.prime(&root, &extension) {
        warn!(root = %root.display(), error = %err, "cannot prime file cache");
    }

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("caravan: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("caravan: file watch error: {err}"),
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = %root.display(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            debug!(?event, "received notify event");

            for path in event.paths {
                let Some(change) =
                    process_file_change(&loader, &mut cache, &root, &path, &extension).await
                else {
                    continue;
                };
                if events_tx.send(change).await.is_err() {
                    debug!("watch event receiver gone; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
