// src/source/mod.rs

//! Collaborators the loader consumes, and their default implementations.
//!
//! - [`DirectoryScanner`] turns a directory into a file [`Manifest`].
//! - [`PathResolver`] maps an import path to a package directory.
//! - [`Analyzer`] checks a package's files and yields opaque type information.
//!
//! The defaults ([`SourceScanner`], [`SearchPathResolver`],
//! [`PackageClauseAnalyzer`]) work on Go-style source trees through the
//! [`FileSystem`](crate::fs::FileSystem) seam.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::package::Environment;
use crate::types::Diagnostic;

pub mod analyzer;
pub mod constraints;
pub mod resolver;
pub mod scanner;

pub use analyzer::{PackageClauseAnalyzer, PackageSummary};
pub use resolver::SearchPathResolver;
pub use scanner::SourceScanner;

/// Opaque handle the analyzer attaches to a package once its non-test files
/// are checked. Dependents receive it through the import callback.
pub type TypeInfo = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    /// 1-based line of the import spec.
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageClause {
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub path: PathBuf,
    pub test: bool,
    /// `None` when the file has no package clause.
    pub package: Option<PackageClause>,
    pub imports: Vec<Import>,
}

/// File set of one package under one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub dir: PathBuf,
    pub files: Vec<SourceFile>,
    /// Non-fatal problems found while scanning, such as malformed build
    /// constraints.
    pub problems: Vec<Diagnostic>,
}

impl Manifest {
    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn files(&self, test: bool) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(move |f| f.test == test)
    }

    /// Distinct import paths of the test or non-test files, each with every
    /// `(file, line)` that mentions it.
    pub fn imports(&self, test: bool) -> BTreeMap<String, Vec<(PathBuf, u32)>> {
        let mut out: BTreeMap<String, Vec<(PathBuf, u32)>> = BTreeMap::new();
        for file in self.files(test) {
            for import in &file.imports {
                out.entry(import.path.clone())
                    .or_default()
                    .push((file.path.clone(), import.line));
            }
        }
        out
    }
}

/// Structural failure: the package cannot be loaded at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no buildable source files in {}", .0.display())]
    NoSourceFiles(PathBuf),

    #[error("reading {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("cannot find package \"{import}\" imported from {}", .from.display())]
    NotFound { import: String, from: PathBuf },
}

pub trait DirectoryScanner: Send + Sync + Debug {
    /// Read the file manifest of `dir` as seen under `env`.
    fn scan(&self, dir: &Path, env: &Environment) -> Result<Manifest, ScanError>;

    /// Every package directory at or below `root`.
    fn package_dirs(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError>;
}

pub trait PathResolver: Send + Sync + Debug {
    fn resolve(&self, import: &str, from: &Path, env: &Environment)
    -> Result<PathBuf, ResolveError>;
}

/// What the analyzer is asked to check.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub dir: PathBuf,
    pub files: Vec<SourceFile>,
    /// Resolved imports: import path to package directory.
    pub imports: BTreeMap<String, PathBuf>,
    /// Checking the test files of the package.
    pub test: bool,
}

#[derive(Debug, Default)]
pub struct Analysis {
    pub diagnostics: Vec<Diagnostic>,
    pub ok: bool,
    pub type_info: Option<TypeInfo>,
}

pub trait Analyzer: Send + Sync + Debug {
    /// Check a file set. `import` answers synchronously with the type
    /// information of an already-loaded dependency directory.
    fn parse_and_check(
        &self,
        input: &AnalysisInput,
        import: &dyn Fn(&Path) -> Option<TypeInfo>,
    ) -> Analysis;
}

/// The collaborator set a loader runs with.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub scanner: Arc<dyn DirectoryScanner>,
    pub resolver: Arc<dyn PathResolver>,
    pub analyzer: Arc<dyn Analyzer>,
}

impl Collaborators {
    pub fn new(
        scanner: Arc<dyn DirectoryScanner>,
        resolver: Arc<dyn PathResolver>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            scanner,
            resolver,
            analyzer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, test: bool, imports: &[(&str, u32)]) -> SourceFile {
        SourceFile {
            name: name.to_string(),
            path: PathBuf::from("/src/foo").join(name),
            test,
            package: None,
            imports: imports
                .iter()
                .map(|(p, l)| Import {
                    path: p.to_string(),
                    line: *l,
                })
                .collect(),
        }
    }

    #[test]
    fn manifest_groups_imports_by_path() {
        let manifest = Manifest {
            dir: PathBuf::from("/src/foo"),
            files: vec![
                file("a.go", false, &[("bar", 3), ("baz", 4)]),
                file("b.go", false, &[("bar", 5)]),
                file("a_test.go", true, &[("qux", 3)]),
            ],
            problems: Vec::new(),
        };

        let imports = manifest.imports(false);
        assert_eq!(imports.keys().collect::<Vec<_>>(), vec!["bar", "baz"]);
        assert_eq!(imports["bar"].len(), 2);
        assert_eq!(
            manifest.imports(true).keys().collect::<Vec<_>>(),
            vec!["qux"]
        );
        assert_eq!(manifest.file_names(), vec!["a.go", "b.go", "a_test.go"]);
    }

    #[test]
    fn scan_errors_render_paths() {
        let err = ScanError::NotADirectory(PathBuf::from("/src/nope"));
        assert_eq!(err.to_string(), "not a directory: /src/nope");
    }
}
