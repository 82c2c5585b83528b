//! Git CLI wrapper used by the conflict-resolution workflow.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::RuntimeError;

/// Start-of-line conflict markers left by an unresolved merge.
static CONFLICT_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(<{7}( |$)|={7}$|>{7} )").expect("static pattern compiles")
});

/// Whether `content` still carries merge conflict markers.
#[must_use]
pub fn contains_conflict_markers(content: &str) -> bool {
    CONFLICT_MARKERS.is_match(content)
}

/// One repository the orchestrator manages.
#[derive(Clone, Debug)]
pub struct GitWorkspace {
    root: PathBuf,
}

impl GitWorkspace {
    /// Wrap the repository at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn run_git(&self, args: &[&str]) -> Result<String, RuntimeError> {
        debug!(?args, "running git");
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| RuntimeError::Git {
                message: format!("failed to spawn git: {e}"),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            warn!(?args, stderr, "git command failed");
            return Err(RuntimeError::Git { message: stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    /// Name of the checked-out branch.
    pub async fn current_branch(&self) -> Result<String, RuntimeError> {
        self.run_git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// Paths with unresolved merge conflicts.
    pub async fn conflicted_paths(&self) -> Result<Vec<String>, RuntimeError> {
        let output = self
            .run_git(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(output
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Current content of a workspace file (conflict markers included).
    pub async fn read_file(&self, path: &str) -> Result<String, RuntimeError> {
        Ok(tokio::fs::read_to_string(self.root.join(path)).await?)
    }

    /// Write resolved content and stage the path.
    pub async fn resolve_file(&self, path: &str, content: &str) -> Result<(), RuntimeError> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        let _ = self.run_git(&["add", path]).await?;
        info!(path, "conflict resolution staged");
        Ok(())
    }

    /// Commit staged changes.
    pub async fn commit(&self, message: &str) -> Result<(), RuntimeError> {
        let _ = self.run_git(&["commit", "-m", message]).await?;
        info!(message, "commit created");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
