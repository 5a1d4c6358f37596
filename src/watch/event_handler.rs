// src/watch/event_handler.rs

//! Turns one filesystem change into a loader invalidation.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::engine::Loader;
use crate::hash::Hash;
use crate::watch::cache::{Change, FileCache};
use crate::watch::path_utils::{is_watched, relative_str};

/// A change the watcher acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub change: Change,
    /// Packages the loader reset.
    pub reset: Vec<Hash>,
}

/// Check one changed path and invalidate the affected packages.
///
/// Returns `None` when the path is not watched, its content did not change,
/// or the loader refused the invalidation.
pub async fn process_file_change(
    loader: &Loader,
    cache: &mut FileCache,
    root: &Path,
    path: &Path,
    extension: &str,
) -> Option<WatchEvent> {
    if !is_watched(root, path, extension) {
        return None;
    }

    let change = cache.refresh(path);
    let rel = relative_str(root, path).unwrap_or_else(|| path.display().to_string());
    if !change.is_change() {
        debug!(path = %rel, "content unchanged; ignoring event");
        return None;
    }

    match loader.invalidate(path).await {
        Ok(reset) => {
            debug!(path = %rel, ?change, reset = reset.len(), "file change processed");
            Some(WatchEvent {
                path: path.to_path_buf(),
                change,
                reset,
            })
        }
        Err(err) => {
            warn!(path = %rel, error = %err, "invalidation failed");
            None
        }
    }
}
