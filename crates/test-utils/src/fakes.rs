use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use caravan::package::Environment;
use caravan::source::{
    Analysis, AnalysisInput, Analyzer, DirectoryScanner, Manifest, PathResolver, ResolveError,
    ScanError, TypeInfo,
};

/// Wraps a scanner and counts `scan` calls per (directory, environment).
#[derive(Debug)]
pub struct CountingScanner {
    inner: Arc<dyn DirectoryScanner>,
    scans: Mutex<HashMap<(PathBuf, String), usize>>,
}

impl CountingScanner {
    pub fn new(inner: Arc<dyn DirectoryScanner>) -> Self {
        Self {
            inner,
            scans: Mutex::new(HashMap::new()),
        }
    }

    /// Scans of `dir` across all environments.
    pub fn scans(&self, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        self.scans
            .lock()
            .iter()
            .filter(|((d, _), _)| d == dir)
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn scans_in(&self, dir: impl AsRef<Path>, env: &Environment) -> usize {
        self.scans
            .lock()
            .get(&(dir.as_ref().to_path_buf(), env.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.scans.lock().values().sum()
    }
}

impl DirectoryScanner for CountingScanner {
    fn scan(&self, dir: &Path, env: &Environment) -> Result<Manifest, ScanError> {
        *self
            .scans
            .lock()
            .entry((dir.to_path_buf(), env.to_string()))
            .or_default() += 1;
        self.inner.scan(dir, env)
    }

    fn package_dirs(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        self.inner.package_dirs(root)
    }
}

/// Wraps an analyzer and counts `parse_and_check` calls per
/// (directory, test).
#[derive(Debug)]
pub struct CountingAnalyzer {
    inner: Arc<dyn Analyzer>,
    checks: Mutex<HashMap<(PathBuf, bool), usize>>,
}

impl CountingAnalyzer {
    pub fn new(inner: Arc<dyn Analyzer>) -> Self {
        Self {
            inner,
            checks: Mutex::new(HashMap::new()),
        }
    }

    pub fn checks(&self, dir: impl AsRef<Path>, test: bool) -> usize {
        self.checks
            .lock()
            .get(&(dir.as_ref().to_path_buf(), test))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.checks.lock().values().sum()
    }
}

impl Analyzer for CountingAnalyzer {
    fn parse_and_check(
        &self,
        input: &AnalysisInput,
        import: &dyn Fn(&Path) -> Option<TypeInfo>,
    ) -> Analysis {
        *self
            .checks
            .lock()
            .entry((input.dir.clone(), input.test))
            .or_default() += 1;
        self.inner.parse_and_check(input, import)
    }
}

/// Wraps a resolver and holds every resolution made from one directory
/// until [`GatedResolver::open`] is called.
///
/// A held resolution gives up after five seconds, so a failing test never
/// leaves a blocking thread behind.
#[derive(Debug)]
pub struct GatedResolver {
    inner: Arc<dyn PathResolver>,
    from: PathBuf,
    state: Mutex<Gate>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct Gate {
    open: bool,
    held: usize,
}

impl GatedResolver {
    pub fn new(inner: Arc<dyn PathResolver>, from: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            from: from.into(),
            state: Mutex::new(Gate::default()),
            changed: Condvar::new(),
        }
    }

    /// Resolutions from the gated directory that have started so far.
    pub fn held(&self) -> usize {
        self.state.lock().held
    }

    pub fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }
}

impl PathResolver for GatedResolver {
    fn resolve(
        &self,
        import: &str,
        from: &Path,
        env: &Environment,
    ) -> Result<PathBuf, ResolveError> {
        if from == self.from {
            let mut gate = self.state.lock();
            gate.held += 1;
            while !gate.open {
                if self
                    .changed
                    .wait_for(&mut gate, Duration::from_secs(5))
                    .timed_out()
                {
                    break;
                }
            }
        }
        self.inner.resolve(import, from, env)
    }
}
