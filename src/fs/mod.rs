// src/fs/mod.rs

//! File-system seam shared by the source scanner, the resolver and the
//! watcher's content cache.
//!
//! Only the queries those three make are here: the loader never writes.

use std::fmt::Debug;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

pub use mock::MockFileSystem;

pub trait FileSystem: Send + Sync + Debug {
    /// Whole source file as text. Non-UTF-8 content is an error.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Streaming reader, used to hash files of any size.
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Full paths of a directory's entries, in path order so scans are
    /// deterministic.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// The host file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading source {}", path.display()))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let listing =
            fs::read_dir(path).with_context(|| format!("listing {}", path.display()))?;
        let mut entries = listing
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("listing {}", path.display()))?;
        entries.sort();
        Ok(entries)
    }
}
