// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to canonicalizing both paths when a direct prefix strip fails
/// (symlinked temp dirs on macOS report different absolute prefixes).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

/// Whether a change at `path` can affect a loaded package: it lies below
/// `root`, outside hidden, `_`-prefixed and `testdata` directories, and is
/// either a source file or extension-less (a directory, possibly removed).
pub fn is_watched(root: &Path, path: &Path, extension: &str) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    let ignored = rel.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.') || name.starts_with('_') || name == "testdata"
        }
        _ => false,
    });
    if ignored {
        return false;
    }
    match path.extension() {
        Some(ext) => ext == extension,
        None => true,
    }
}
