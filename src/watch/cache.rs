// src/watch/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::hash::Hash;

/// What a refresh observed for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Created,
    Modified,
    Removed,
}

impl Change {
    pub fn is_change(self) -> bool {
        self != Change::Unchanged
    }
}

/// Content hashes of watched files.
///
/// Editors and build tools touch files without changing them; comparing
/// content hashes keeps those events from invalidating anything.
#[derive(Debug)]
pub struct FileCache {
    fs: Arc<dyn FileSystem>,
    hashes: HashMap<PathBuf, Hash>,
}

impl FileCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            hashes: HashMap::new(),
        }
    }

    fn hash_file(&self, path: &Path) -> Result<Hash> {
        Hash::of_reader(self.fs.open_read(path)?)
    }

    /// Record the current hash of every file with `extension` below `root`.
    pub fn prime(&mut self, root: &Path, extension: &str) -> Result<usize> {
        let mut stack = vec![root.to_path_buf()];
        let mut count = 0;
        while let Some(dir) = stack.pop() {
            for entry in self.fs.read_dir(&dir)? {
                if self.fs.is_dir(&entry) {
                    stack.push(entry);
                } else if entry.extension().is_some_and(|e| e == extension) {
                    let hash = self.hash_file(&entry)?;
                    self.hashes.insert(entry, hash);
                    count += 1;
                }
            }
        }
        debug!(root = %root.display(), files = count, "primed file cache");
        Ok(count)
    }

    pub fn get(&self, path: &Path) -> Option<Hash> {
        self.hashes.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Re-hash `path` and report how it differs from the cached state.
    ///
    /// A path that no longer exists drops itself and every cached file below
    /// it, which covers removed directories.
    pub fn refresh(&mut self, path: &Path) -> Change {
        if !self.fs.exists(path) {
            let before = self.hashes.len();
            self.hashes.retain(|p, _| !p.starts_with(path));
            return if self.hashes.len() < before {
                Change::Removed
            } else {
                Change::Unchanged
            };
        }
        if !self.fs.is_file(path) {
            return Change::Unchanged;
        }

        match self.hash_file(path) {
            Ok(hash) => match self.hashes.insert(path.to_path_buf(), hash) {
                Some(old) if old == hash => Change::Unchanged,
                Some(_) => Change::Modified,
                None => Change::Created,
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot hash file; treating as modified");
                self.hashes.remove(path);
                Change::Modified
            }
        }
    }
}
