//! Conflict-set bookkeeping for the merge-resolution workflow.
//!
//! The tracker holds the set of file paths with unresolved merge
//! markers. The workflow moves `Normal → ConflictDetected` when the set
//! is populated and reaches `Resolved` exactly when the last path is
//! removed; the orchestrator commits at that transition and nowhere
//! else.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Phase of the merge-resolution workflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    /// No unresolved conflicts known.
    #[default]
    Normal,
    /// At least one path awaits resolution.
    ConflictDetected,
    /// The set emptied; a commit has been issued.
    Resolved,
}

/// Thread-safe conflict set + phase.
#[derive(Debug, Default)]
pub struct ConflictTracker {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    paths: BTreeSet<String>,
    phase: MergePhase,
}

impl ConflictTracker {
    /// Create an empty tracker in the `Normal` phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> MergePhase {
        self.inner.lock().phase
    }

    /// Unresolved paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.inner.lock().paths.iter().cloned().collect()
    }

    /// Whether any path awaits resolution.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.inner.lock().paths.is_empty()
    }

    /// Populate the set and enter `ConflictDetected`. Returns the paths
    /// that were not already tracked (the ones needing a new resolution
    /// request).
    pub fn begin<I: IntoIterator<Item = String>>(&self, paths: I) -> Vec<String> {
        let mut inner = self.inner.lock();
        let mut fresh = Vec::new();
        for path in paths {
            if inner.paths.insert(path.clone()) {
                fresh.push(path);
            }
        }
        if !inner.paths.is_empty() {
            inner.phase = MergePhase::ConflictDetected;
        }
        fresh
    }

    /// Remove one resolved path. Returns `true` exactly when this call
    /// emptied the set — the moment the workflow commits.
    pub fn resolve(&self, path: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.paths.remove(path);
        if removed && inner.paths.is_empty() {
            inner.phase = MergePhase::Resolved;
            return true;
        }
        false
    }

    /// Drop every tracked path (merge aborted externally).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.paths.clear();
        inner.phase = MergePhase::Normal;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_enters_conflict_phase() {
        let tracker = ConflictTracker::new();
        assert_eq!(tracker.phase(), MergePhase::Normal);
        let fresh = tracker.begin(["a.rs".to_owned(), "b.rs".to_owned()]);
        assert_eq!(fresh.len(), 2);
        assert_eq!(tracker.phase(), MergePhase::ConflictDetected);
    }

    #[test]
    fn begin_reports_only_new_paths() {
        let tracker = ConflictTracker::new();
        let _ = tracker.begin(["a.rs".to_owned()]);
        let fresh = tracker.begin(["a.rs".to_owned(), "b.rs".to_owned()]);
        assert_eq!(fresh, ["b.rs"]);
    }

    #[test]
    fn resolve_signals_commit_only_on_last_path() {
        let tracker = ConflictTracker::new();
        let _ = tracker.begin(["a.rs".to_owned(), "b.rs".to_owned()]);

        assert!(!tracker.resolve("a.rs"));
        assert_eq!(tracker.phase(), MergePhase::ConflictDetected);

        assert!(tracker.resolve("b.rs"));
        assert_eq!(tracker.phase(), MergePhase::Resolved);
        assert!(!tracker.has_conflicts());
    }

    #[test]
    fn resolving_unknown_path_is_inert() {
        let tracker = ConflictTracker::new();
        let _ = tracker.begin(["a.rs".to_owned()]);
        assert!(!tracker.resolve("other.rs"));
        assert!(tracker.has_conflicts());
    }

    #[test]
    fn reset_returns_to_normal() {
        let tracker = ConflictTracker::new();
        let _ = tracker.begin(["a.rs".to_owned()]);
        tracker.reset();
        assert_eq!(tracker.phase(), MergePhase::Normal);
        assert!(tracker.paths().is_empty());
    }
}
