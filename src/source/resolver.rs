// src/source/resolver.rs

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::fs::FileSystem;
use crate::package::Environment;
use crate::source::{PathResolver, ResolveError};

/// Resolves imports against the importing directory, enclosing `vendor/`
/// directories and a list of search roots, in that order.
#[derive(Debug, Clone)]
pub struct SearchPathResolver {
    fs: Arc<dyn FileSystem>,
    search_paths: Vec<PathBuf>,
}

impl SearchPathResolver {
    pub fn new(fs: Arc<dyn FileSystem>, search_paths: Vec<PathBuf>) -> Self {
        Self { fs, search_paths }
    }

    fn candidates(&self, import: &str, from: &Path) -> Vec<PathBuf> {
        if is_relative_import(import) {
            return vec![normalize(&from.join(import))];
        }
        let vendored = from
            .ancestors()
            .map(|dir| dir.join("vendor").join(import));
        let searched = self.search_paths.iter().map(|root| root.join(import));
        vendored.chain(searched).collect()
    }
}

fn is_relative_import(import: &str) -> bool {
    import == "." || import == ".." || import.starts_with("./") || import.starts_with("../")
}

/// Lexically drop `.` and resolve `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl PathResolver for SearchPathResolver {
    fn resolve(
        &self,
        import: &str,
        from: &Path,
        _env: &Environment,
    ) -> Result<PathBuf, ResolveError> {
        for candidate in self.candidates(import, from) {
            if self.fs.is_dir(&candidate) {
                trace!(import, from = %from.display(), to = %candidate.display(), "resolved import");
                return Ok(candidate);
            }
        }
        Err(ResolveError::NotFound {
            import: import.to_string(),
            from: from.to_path_buf(),
        })
    }
}
