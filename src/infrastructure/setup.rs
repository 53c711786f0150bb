//! Startup wiring: directory layout, tool preflight, and construction of
//! the concrete collaborators from configuration.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::application::Collaborators;
use crate::domain::models::Config;
use crate::domain::ports::{
    CodeHost, CompletionHook, ExecutionBackend, IssueTracker, TaskStore, WorkspaceManager,
};
use crate::infrastructure::gh_cli::GhCli;
use crate::infrastructure::git_worktrees::GitWorktrees;
use crate::infrastructure::json_backlog::JsonBacklog;
use crate::infrastructure::script_hook::ScriptHook;
use crate::infrastructure::store::FileTaskStore;
use crate::infrastructure::tmux::TmuxSessions;

/// Create the state and worktree directories under `repo_root`.
pub fn ensure_dirs(config: &Config, repo_root: &Path) -> Result<()> {
    for dir in [&config.state_dir, &config.workspace.worktree_root] {
        let path = repo_root.join(dir);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }
    Ok(())
}

/// The task store for the project at `repo_root`. Needs no external tools.
pub fn task_store(config: &Config, repo_root: &Path) -> Arc<FileTaskStore> {
    Arc::new(FileTaskStore::new(repo_root.join(&config.state_dir)))
}

/// Build every collaborator and check that git, tmux and gh are usable.
///
/// A missing tool is the one fatal startup condition.
pub async fn connect(config: &Config, repo_root: &Path) -> Result<Collaborators> {
    let workspace = GitWorktrees::new(repo_root);
    let executor = TmuxSessions::new(repo_root);
    let code_host = GhCli::new(repo_root);

    workspace.preflight().await.context("git preflight failed")?;
    executor.preflight().await.context("tmux preflight failed")?;
    if !code_host.preflight().await {
        bail!("Required tool unavailable: gh");
    }

    let backlog_path = repo_root.join(&config.backlog_file);
    if !backlog_path.exists() {
        bail!("Backlog file not found: {}", backlog_path.display());
    }

    ensure_dirs(config, repo_root)?;

    let hooks: Vec<Arc<dyn CompletionHook>> = config
        .hooks
        .iter()
        .map(|hook| Arc::new(ScriptHook::new(hook.clone(), repo_root)) as Arc<dyn CompletionHook>)
        .collect();

    info!(
        repo = %repo_root.display(),
        hooks = hooks.len(),
        "Preflight passed"
    );

    Ok(Collaborators {
        tracker: Arc::new(JsonBacklog::new(backlog_path)) as Arc<dyn IssueTracker>,
        code_host: Arc::new(code_host) as Arc<dyn CodeHost>,
        workspace: Arc::new(workspace) as Arc<dyn WorkspaceManager>,
        executor: Arc::new(executor) as Arc<dyn ExecutionBackend>,
        store: task_store(config, repo_root) as Arc<dyn TaskStore>,
        hooks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        ensure_dirs(&config, dir.path()).unwrap();
        assert!(dir.path().join(".mill/state").is_dir());
        assert!(dir.path().join(".mill/worktrees").is_dir());
    }
}
