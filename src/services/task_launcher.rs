//! Task launcher.
//!
//! Turns an admitted candidate into a running task: worktree, persisted
//! records, then the agent's execution context. Any failure rolls back
//! what was created, so a failed launch never leaves an orphaned worktree
//! or a task record pointing at nothing.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::LaunchError;
use crate::domain::models::{
    AgentConfig, Candidate, CheckCommands, Config, ConflictKey, ExecutionHandle, PhaseState, PrState,
    Task, TaskStatus,
};
use crate::domain::ports::{CodeHost, ExecutionBackend, ExecutionSpec, TaskStore, WorkspaceManager};
use crate::services::agent_routing::resolve_invocation;
use crate::services::branch_naming::{sanitize_with_limit, BranchName, TaskKind};

/// Relaunches of one candidate before giving up on finding a fresh name.
const MAX_ATTEMPTS: u32 = 20;

/// Launch-time settings resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub base_branch: String,
    pub worktree_root: PathBuf,
    pub branch_prefix: Option<String>,
    pub max_branch_len: usize,
    pub checks: CheckCommands,
    pub agent: AgentConfig,
    pub query_timeout: Duration,
}

impl From<&Config> for LaunchSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_branch: config.workspace.base_branch.clone(),
            worktree_root: config.workspace.worktree_root.clone(),
            branch_prefix: config.workspace.branch_prefix.clone(),
            max_branch_len: config.workspace.max_branch_len,
            checks: config.checks.clone(),
            agent: config.agent.clone(),
            query_timeout: config.monitor.query_timeout(),
        }
    }
}

pub struct TaskLauncher {
    workspace: Arc<dyn WorkspaceManager>,
    executor: Arc<dyn ExecutionBackend>,
    store: Arc<dyn TaskStore>,
    code_host: Option<Arc<dyn CodeHost>>,
    settings: LaunchSettings,
}

impl TaskLauncher {
    pub fn new(
        workspace: Arc<dyn WorkspaceManager>,
        executor: Arc<dyn ExecutionBackend>,
        store: Arc<dyn TaskStore>,
        settings: LaunchSettings,
    ) -> Self {
        Self {
            workspace,
            executor,
            store,
            code_host: None,
            settings,
        }
    }

    /// Consult the code host so a relaunch never lands on a branch that
    /// already carries a PR.
    pub fn with_code_host(mut self, code_host: Arc<dyn CodeHost>) -> Self {
        self.code_host = Some(code_host);
        self
    }

    /// Create the workspace, persist the task and start its agent.
    ///
    /// The returned task is `Active` and already persisted. It is not yet
    /// in the active set; the caller registers it.
    #[instrument(skip(self, candidate, conflict_key), fields(candidate_id = %candidate.id))]
    pub async fn launch(
        &self,
        candidate: &Candidate,
        conflict_key: ConflictKey,
    ) -> Result<Task, LaunchError> {
        let prefix = self
            .settings
            .branch_prefix
            .clone()
            .unwrap_or_else(|| TaskKind::classify(&candidate.title).branch_prefix().to_string());
        let base = sanitize_with_limit(
            &format!("{} {}", candidate.id, candidate.title),
            &prefix,
            self.settings.max_branch_len,
        );
        let name = self.claim_name(&base).await?;
        let task_id = name.slug.clone();
        let branch = name.full();

        let worktree_path = self.settings.worktree_root.join(&task_id);
        self.workspace
            .create(&branch, &worktree_path, &self.settings.base_branch)
            .await?;

        let handle = ExecutionHandle(format!("{}-{}", self.settings.agent.session_prefix, task_id));
        let mut task = Task::admitted(
            &task_id,
            &candidate.id,
            &candidate.title,
            &branch,
            &worktree_path,
            handle.clone(),
            conflict_key,
            PhaseState::new(self.settings.checks.clone()),
        );

        // Persist before starting so a crash right after start still
        // leaves a record pointing at the running context.
        if let Err(e) = self.persist(&task).await {
            self.rollback(&task).await;
            return Err(e);
        }

        let objective = format!("{}: {}", candidate.id, candidate.title);
        let invocation = resolve_invocation(&self.settings.agent, &task_id, &branch, &objective);
        let spec = ExecutionSpec {
            handle,
            working_dir: worktree_path.clone(),
            program: invocation.program,
            args: invocation.args,
            env: BTreeMap::from([
                ("MILL_TASK_ID".to_string(), task_id.clone()),
                ("MILL_CANDIDATE_ID".to_string(), candidate.id.clone()),
                ("MILL_BRANCH".to_string(), branch.clone()),
            ]),
        };

        match self.executor.start(&spec).await {
            Ok(handle) => task.execution_handle = handle,
            Err(e) => {
                error!(error = %e, "Agent start failed, rolling back");
                self.rollback(&task).await;
                return Err(e.into());
            }
        }

        task.set_status(TaskStatus::Active);
        if let Err(e) = self.store.save_task(&task).await {
            // The agent is running and an Admitted record exists; the
            // monitor promotes it on its next cycle.
            warn!(error = %e, "Could not persist active status");
        }

        info!(task_id = %task.id, branch = %task.branch, handle = %task.execution_handle, "Task launched");
        Ok(task)
    }

    /// First attempt name with no task record and no PR on its branch.
    ///
    /// Earlier attempts keep their records and branches; reusing either
    /// would let the old PR decide the new task's outcome.
    async fn claim_name(&self, base: &BranchName) -> Result<BranchName, LaunchError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let name = base.attempt(attempt, self.settings.max_branch_len);
            if let Some(existing) = self.store.load_task(&name.slug).await? {
                if !existing.is_terminal() {
                    return Err(LaunchError::AlreadyTracked(name.slug));
                }
                debug!(task_id = %name.slug, status = existing.status.as_str(), "Name used by an earlier attempt");
                continue;
            }
            if self.branch_has_pr(&name.full()).await {
                debug!(branch = %name.full(), "Branch already carries a PR");
                continue;
            }
            return Ok(name);
        }
        Err(LaunchError::NamesExhausted(base.slug.clone()))
    }

    async fn branch_has_pr(&self, branch: &str) -> bool {
        let Some(code_host) = &self.code_host else {
            return false;
        };
        match tokio::time::timeout(self.settings.query_timeout, code_host.find_pr(branch)).await {
            Ok(lookup) => match lookup.state {
                PrState::Merged | PrState::Open | PrState::Closed => true,
                PrState::None => false,
                PrState::Unknown => {
                    warn!(branch, "PR state unknown, assuming the branch is unused");
                    false
                }
            },
            Err(_) => {
                warn!(branch, "PR lookup timed out, assuming the branch is unused");
                false
            }
        }
    }

    async fn persist(&self, task: &Task) -> Result<(), LaunchError> {
        self.store.save_phase_state(&task.id, &task.phase_state).await?;
        self.store.save_task(task).await?;
        Ok(())
    }

    /// Undo a launch: stop the context if one started, remove the worktree
    /// and branch, delete the records. Every step is best effort.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn rollback(&self, task: &Task) {
        if let Err(e) = self.executor.stop(&task.execution_handle).await {
            warn!(error = %e, "Rollback: could not stop execution context");
        }
        if let Err(e) = self
            .workspace
            .remove(&task.worktree_path, &task.branch, true)
            .await
        {
            warn!(error = %e, "Rollback: could not remove worktree");
        }
        if let Err(e) = self.store.delete_task(&task.id).await {
            warn!(error = %e, "Rollback: could not delete task records");
        }
    }
}
