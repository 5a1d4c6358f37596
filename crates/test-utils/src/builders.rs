#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use caravan::config::{ConfigFile, LoaderSection, RawConfigFile};
use caravan::engine::Loader;
use caravan::fs::{FileSystem, MockFileSystem};
use caravan::package::Environment;
use caravan::source::Collaborators;

use crate::fakes::{CountingAnalyzer, CountingScanner};

/// Root of every tree built by [`SourceTreeBuilder`].
pub const ROOT: &str = "/ws";

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                loader: LoaderSection::default(),
                environments: Vec::new(),
            },
        }
    }

    pub fn with_environment(mut self, os: &str, arch: &str, tags: &[&str]) -> Self {
        self.config
            .environments
            .push(Environment::new(os, arch, tags.iter().copied()));
        self
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.loader.search_paths.push(path.into());
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.loader.exclude.push(pattern.to_string());
        self
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.config.loader.event_buffer = size;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Go-like source text: a package clause followed by an import group.
pub fn go_source(package: &str, imports: &[&str]) -> String {
    let mut out = format!("package {package}\n");
    if !imports.is_empty() {
        out.push_str("\nimport (\n");
        for import in imports {
            out.push_str(&format!("\t\"{import}\"\n"));
        }
        out.push_str(")\n");
    }
    out.push_str("\nfunc init() {}\n");
    out
}

/// Builder for an in-memory source tree rooted at [`ROOT`].
pub struct SourceTreeBuilder {
    fs: MockFileSystem,
    root: PathBuf,
}

impl SourceTreeBuilder {
    pub fn new() -> Self {
        let fs = MockFileSystem::new();
        fs.add_dir(ROOT);
        Self {
            fs,
            root: PathBuf::from(ROOT),
        }
    }

    /// A package directory `rel` holding `<dir name>.go` in package
    /// `<dir name>` with the given imports.
    pub fn package(self, rel: &str, imports: &[&str]) -> Self {
        let name = Path::new(rel)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        let file = format!("{rel}/{name}.go");
        self.file(&file, &go_source(&name, imports))
    }

    pub fn file(self, rel: &str, content: &str) -> Self {
        self.fs.add_file(self.root.join(rel), content.as_bytes().to_vec());
        self
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn build(self) -> MockFileSystem {
        self.fs
    }
}

impl Default for SourceTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A loader over `fs` whose scanner and analyzer count their calls.
pub struct CountingLoader {
    pub loader: Loader,
    pub scanner: Arc<CountingScanner>,
    pub analyzer: Arc<CountingAnalyzer>,
}

/// Build a [`CountingLoader`] from a config. Must be called inside a tokio
/// runtime.
pub fn counting_loader(cfg: &ConfigFile, fs: &MockFileSystem) -> CountingLoader {
    let fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let base = cfg.collaborators(fs);

    let scanner = Arc::new(CountingScanner::new(base.scanner));
    let analyzer = Arc::new(CountingAnalyzer::new(base.analyzer));
    let collaborators = Collaborators::new(scanner.clone(), base.resolver, analyzer.clone());

    CountingLoader {
        loader: Loader::new(collaborators, cfg.loader_options()),
        scanner,
        analyzer,
    }
}

/// Default config for trees built by [`SourceTreeBuilder`]: one linux/amd64
/// environment, imports resolved against [`ROOT`].
pub fn linux_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_environment("linux", "amd64", &[])
        .with_search_path(ROOT)
        .build()
}
