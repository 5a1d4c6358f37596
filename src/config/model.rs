// src/config/model.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::GlobSet;
use serde::Deserialize;

use crate::engine::LoaderOptions;
use crate::fs::FileSystem;
use crate::package::Environment;
use crate::source::{
    Collaborators, PackageClauseAnalyzer, SearchPathResolver, SourceScanner,
};

/// Configuration exactly as read from TOML, before validation.
///
/// ```toml
/// [loader]
/// extension = "go"
/// test_suffix = "_test"
/// search_paths = ["vendor-src", "/usr/lib/go/src"]
/// exclude = ["third_party/**"]
/// event_buffer = 64
///
/// [[environment]]
/// os = "linux"
/// arch = "amd64"
/// tags = ["netgo"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub loader: LoaderSection,

    #[serde(default, rename = "environment")]
    pub environments: Vec<Environment>,
}

/// `[loader]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderSection {
    /// Source file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// File stem suffix marking test files.
    #[serde(default = "default_test_suffix")]
    pub test_suffix: String,

    /// Roots searched for non-relative imports, in order. Relative entries
    /// are resolved against the config file's directory.
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Globs (relative to the load root) of directories never loaded.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Capacity of the loader's event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_extension() -> String {
    "go".to_string()
}

fn default_test_suffix() -> String {
    "_test".to_string()
}

fn default_event_buffer() -> usize {
    64
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            test_suffix: default_test_suffix(),
            search_paths: Vec::new(),
            exclude: Vec::new(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Validated configuration. Construct it with `ConfigFile::try_from`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub loader: LoaderSection,
    pub environments: Vec<Environment>,
    exclude: GlobSet,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        loader: LoaderSection,
        environments: Vec<Environment>,
        exclude: GlobSet,
    ) -> Self {
        Self {
            loader,
            environments,
            exclude,
        }
    }

    pub fn exclude_set(&self) -> &GlobSet {
        &self.exclude
    }

    /// Resolve relative search paths against `base`.
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        for path in &mut self.loader.search_paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            event_buffer: self.loader.event_buffer,
        }
    }

    /// The default scanner, resolver and analyzer over `fs`.
    pub fn collaborators(&self, fs: Arc<dyn FileSystem>) -> Collaborators {
        Collaborators::new(
            Arc::new(SourceScanner::new(
                Arc::clone(&fs),
                self.loader.extension.clone(),
                self.loader.test_suffix.clone(),
                self.exclude.clone(),
            )),
            Arc::new(SearchPathResolver::new(
                fs,
                self.loader.search_paths.clone(),
            )),
            Arc::new(PackageClauseAnalyzer::new()),
        )
    }
}
