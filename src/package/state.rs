// src/package/state.rs

//! Load-state pipeline of a distinct package.

use std::fmt;

/// Pipeline stage a distinct package has reached.
///
/// Variants are declared in pipeline order, so the derived `Ord` is the
/// forward order used by readiness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadState {
    /// Created, file manifest not read yet.
    Queued,
    /// Manifest known; imports not resolved, nothing analyzed.
    Unloaded,
    /// Non-test files resolved and analyzed.
    LoadedGo,
    /// Test files resolved (weakly) and analyzed.
    LoadedTest,
    Done,
}

impl LoadState {
    /// The state a successful transition from `self` lands in.
    pub fn next(self) -> Option<LoadState> {
        match self {
            LoadState::Queued => Some(LoadState::Unloaded),
            LoadState::Unloaded => Some(LoadState::LoadedGo),
            LoadState::LoadedGo => Some(LoadState::LoadedTest),
            LoadState::LoadedTest => Some(LoadState::Done),
            LoadState::Done => None,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::Queued => "queued",
            LoadState::Unloaded => "unloaded",
            LoadState::LoadedGo => "loadedGo",
            LoadState::LoadedTest => "loadedTest",
            LoadState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Value carried by a package's readiness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub state: LoadState,
    /// Set when the package stopped advancing because of a structural or
    /// cycle failure. Cleared by invalidation.
    pub failed: bool,
}

impl Readiness {
    pub(crate) fn queued() -> Self {
        Self {
            state: LoadState::Queued,
            failed: false,
        }
    }

    /// True iff the state is strictly past `threshold`.
    pub fn is_past(&self, threshold: LoadState) -> bool {
        self.state > threshold
    }

    pub fn is_terminal(&self) -> bool {
        self.failed || self.state == LoadState::Done
    }
}
