//! Workspace (VCS) port.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::errors::WorkspaceError;

/// Creates and removes the isolated worktree each task works in.
#[async_trait]
pub trait WorkspaceManager: Send + Sync {
    /// Check that the tooling is installed. Called once before the loop starts.
    async fn preflight(&self) -> Result<(), WorkspaceError>;

    /// Create a new branch off `base` checked out at `path`.
    async fn create(&self, branch: &str, path: &Path, base: &str) -> Result<(), WorkspaceError>;

    /// Remove the worktree at `path`; delete `branch` too when asked.
    async fn remove(&self, path: &Path, branch: &str, delete_branch: bool)
        -> Result<(), WorkspaceError>;
}
