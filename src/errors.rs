// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::ContextId;
use crate::hash::Hash;
use crate::source::ScanError;

#[derive(Error, Debug)]
pub enum CaravanError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Node not found: {0}")]
    MissingNode(Hash),

    #[error("Unknown loader context: {0}")]
    UnknownContext(ContextId),

    /// A strong edge would have closed a cycle. `path` starts and ends with
    /// the `from` key of the rejected connect.
    #[error("Cycle detected in DAG: {}", CyclePath(.path))]
    Cycle { path: Vec<Hash> },

    #[error("Out-of-order wait: id {id} is not greater than last registered id {last}")]
    OutOfOrderWait { id: u64, last: u64 },

    #[error("Id {0} was never registered")]
    NotRegistered(u64),

    #[error("Id {0} was already marked ready")]
    AlreadyReady(u64),

    #[error("Loader has been shut down")]
    ShutDown,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a distinct package stopped advancing.
///
/// Failures are fatal to the affected node only. Dependents waiting on it are
/// released with a clone of the failure.
#[derive(Error, Debug, Clone)]
pub enum LoadFailure {
    #[error("{0}")]
    Structural(#[from] ScanError),

    /// Resolving a strong import produced a cycle. This indicates a resolution
    /// bug, not a user error, and is never silently dropped.
    #[error("internal resolution produced an import cycle: {}", DisplayPaths(.path))]
    Cycle { path: Vec<PathBuf> },

    #[error("internal error: {0}")]
    Internal(String),
}

struct CyclePath<'a>(&'a [Hash]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

struct DisplayPaths<'a>(&'a [PathBuf]);

impl fmt::Display for DisplayPaths<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CaravanError>;
