//! Git worktree workspace adapter.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::WorkspaceError;
use crate::domain::ports::WorkspaceManager;
use crate::infrastructure::process;

/// One `git worktree` per task, created off the base branch.
pub struct GitWorktrees {
    repo_root: PathBuf,
}

impl GitWorktrees {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> std::io::Result<process::CommandOutput> {
        process::run("git", args, Some(&self.repo_root)).await
    }

    async fn branch_exists(&self, branch: &str) -> bool {
        let reference = format!("refs/heads/{branch}");
        matches!(
            self.git(&["show-ref", "--verify", "--quiet", &reference]).await,
            Ok(out) if out.success
        )
    }
}

#[async_trait]
impl WorkspaceManager for GitWorktrees {
    async fn preflight(&self) -> Result<(), WorkspaceError> {
        match self.git(&["rev-parse", "--git-dir"]).await {
            Ok(out) if out.success => Ok(()),
            Ok(out) => Err(WorkspaceError::ToolMissing(format!(
                "{} is not a git repository: {}",
                self.repo_root.display(),
                out.stderr
            ))),
            Err(e) => Err(WorkspaceError::ToolMissing(format!("git: {e}"))),
        }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create(&self, branch: &str, path: &Path, base: &str) -> Result<(), WorkspaceError> {
        let path_str = path.to_string_lossy().into_owned();
        let fail = |reason: String| WorkspaceError::CreateFailed {
            path: path_str.clone(),
            reason,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(self.repo_root.join(parent))
                .await
                .map_err(|e| fail(e.to_string()))?;
        }

        // A branch left behind by an abandoned run is checked out again
        // rather than recreated.
        let output = if self.branch_exists(branch).await {
            debug!(branch, "Reusing existing branch");
            self.git(&["worktree", "add", &path_str, branch]).await
        } else {
            self.git(&["worktree", "add", "-b", branch, &path_str, base]).await
        }
        .map_err(|e| fail(e.to_string()))?;

        if !output.success {
            return Err(fail(output.stderr));
        }

        info!(branch, base, "Created worktree");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove(&self, path: &Path, branch: &str, delete_branch: bool) -> Result<(), WorkspaceError> {
        let path_str = path.to_string_lossy().into_owned();
        let fail = |reason: String| WorkspaceError::RemoveFailed {
            path: path_str.clone(),
            reason,
        };

        if self.repo_root.join(path).exists() {
            let output = self
                .git(&["worktree", "remove", "--force", &path_str])
                .await
                .map_err(|e| fail(e.to_string()))?;
            if !output.success {
                return Err(fail(output.stderr));
            }
        } else {
            debug!("Worktree directory already gone, pruning");
            if let Err(e) = self.git(&["worktree", "prune"]).await {
                warn!(error = %e, "git worktree prune failed");
            }
        }

        if delete_branch && self.branch_exists(branch).await {
            match self.git(&["branch", "-D", branch]).await {
                Ok(out) if out.success => debug!(branch, "Deleted branch"),
                Ok(out) => warn!(branch, stderr = %out.stderr, "Could not delete branch"),
                Err(e) => warn!(branch, error = %e, "Could not delete branch"),
            }
        }

        info!(branch, delete_branch, "Removed worktree");
        Ok(())
    }
}
