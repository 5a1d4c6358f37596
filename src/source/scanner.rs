// src/source/scanner.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use globset::GlobSet;
use regex::Regex;
use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::package::Environment;
use crate::source::constraints::{eval_build_expr, find_build_expr, matches_file_name};
use crate::source::{DirectoryScanner, Import, Manifest, PackageClause, ScanError, SourceFile};
use crate::types::Diagnostic;

static SINGLE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).expect("single import pattern")
});
static GROUP_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s*\(\s*$").expect("import group pattern"));
static GROUP_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:[\w.]+\s+)?"([^"]+)""#).expect("import spec pattern")
});
static GROUP_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\)").expect("import group close pattern"));
static PACKAGE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*package\s+([A-Za-z_][A-Za-z0-9_]*)").expect("package clause pattern")
});

/// First package clause of a source file.
pub fn extract_package_clause(source: &str) -> Option<PackageClause> {
    source.lines().enumerate().find_map(|(idx, line)| {
        PACKAGE_CLAUSE.captures(line).map(|caps| PackageClause {
            name: caps[1].to_string(),
            line: idx as u32 + 1,
        })
    })
}

/// Import specs of a source file, in order, with 1-based line numbers.
pub fn extract_imports(source: &str) -> Vec<Import> {
    let mut imports = Vec::new();
    let mut in_group = false;
    for (idx, line) in source.lines().enumerate() {
        let line_no = idx as u32 + 1;
        if in_group {
            if GROUP_CLOSE.is_match(line) {
                in_group = false;
            } else if let Some(caps) = GROUP_SPEC.captures(line) {
                imports.push(Import {
                    path: caps[1].to_string(),
                    line: line_no,
                });
            }
            continue;
        }
        if GROUP_OPEN.is_match(line) {
            in_group = true;
        } else if let Some(caps) = SINGLE_IMPORT.captures(line) {
            imports.push(Import {
                path: caps[1].to_string(),
                line: line_no,
            });
        }
    }
    imports
}

/// Filesystem-backed [`DirectoryScanner`] for Go-style trees.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    fs: Arc<dyn FileSystem>,
    extension: String,
    test_suffix: String,
    exclude: GlobSet,
}

impl SourceScanner {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        extension: impl Into<String>,
        test_suffix: impl Into<String>,
        exclude: GlobSet,
    ) -> Self {
        Self {
            fs,
            extension: extension.into(),
            test_suffix: test_suffix.into(),
            exclude,
        }
    }

    /// Stem of a candidate source file name, or `None` for files the
    /// scanner never considers.
    fn source_stem<'a>(&self, name: &'a str) -> Option<&'a str> {
        if name.starts_with('.') || name.starts_with('_') {
            return None;
        }
        name.strip_suffix(&self.extension)?.strip_suffix('.')
    }

    fn skip_dir(&self, root: &Path, dir: &Path) -> bool {
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if dir != root && (name.starts_with('.') || name.starts_with('_') || name == "testdata")
        {
            return true;
        }
        let rel = dir.strip_prefix(root).unwrap_or(dir);
        !rel.as_os_str().is_empty() && self.exclude.is_match(rel)
    }

    fn has_source_files(&self, entries: &[PathBuf]) -> bool {
        entries.iter().any(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| self.source_stem(n))
                .is_some()
                && self.fs.is_file(p)
        })
    }
}

impl DirectoryScanner for SourceScanner {
    fn scan(&self, dir: &Path, env: &Environment) -> Result<Manifest, ScanError> {
        if !self.fs.is_dir(dir) {
            return Err(ScanError::NotADirectory(dir.to_path_buf()));
        }
        let entries = self.fs.read_dir(dir).map_err(|e| ScanError::Io {
            path: dir.to_path_buf(),
            message: format!("{e:#}"),
        })?;

        let mut manifest = Manifest {
            dir: dir.to_path_buf(),
            ..Default::default()
        };

        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = self.source_stem(name) else {
                continue;
            };
            if !self.fs.is_file(&path) {
                continue;
            }

            let (stem, test) = match stem.strip_suffix(&self.test_suffix) {
                Some(base) => (base, true),
                None => (stem, false),
            };
            if !matches_file_name(stem, env) {
                trace!(file = %path.display(), %env, "excluded by file name");
                continue;
            }

            let source = self.fs.read_to_string(&path).map_err(|e| ScanError::Io {
                path: path.clone(),
                message: format!("{e:#}"),
            })?;

            if let Some((line, expr)) = find_build_expr(&source) {
                match eval_build_expr(expr, env) {
                    Ok(true) => {}
                    Ok(false) => {
                        trace!(file = %path.display(), %env, expr, "excluded by build constraint");
                        continue;
                    }
                    Err(e) => manifest
                        .problems
                        .push(Diagnostic::error(&path, line, e.to_string())),
                }
            }

            manifest.files.push(SourceFile {
                name: name.to_string(),
                package: extract_package_clause(&source),
                imports: extract_imports(&source),
                path,
                test,
            });
        }

        if manifest.files.is_empty() {
            return Err(ScanError::NoSourceFiles(dir.to_path_buf()));
        }

        debug!(
            dir = %dir.display(),
            %env,
            files = manifest.files.len(),
            "scanned package"
        );
        Ok(manifest)
    }

    fn package_dirs(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !self.fs.is_dir(root) {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            if self.skip_dir(root, &dir) {
                trace!(dir = %dir.display(), "skipping directory");
                continue;
            }
            let entries = self.fs.read_dir(&dir).map_err(|e| ScanError::Io {
                path: dir.clone(),
                message: format!("{e:#}"),
            })?;
            if self.has_source_files(&entries) {
                out.push(dir.clone());
            }
            stack.extend(entries.into_iter().filter(|p| self.fs.is_dir(p)));
        }

        out.sort();
        Ok(out)
    }
}
