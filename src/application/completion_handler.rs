//! Completion handling.
//!
//! Retires a task: records the outcome, runs post-completion hooks, stops
//! the agent, reclaims the worktree and drops the task from the active set.
//! Safe to call repeatedly for the same task.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::application::active_set::ActiveSet;
use crate::domain::errors::StoreError;
use crate::domain::models::{IssueState, Outcome, Task};
use crate::domain::ports::{CompletionHook, ExecutionBackend, IssueTracker, TaskStore, WorkspaceManager};

/// What a `complete` call actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReport {
    /// Not in the active set; nothing to do
    AlreadyRetired,
    /// A previous attempt recorded the outcome; only deregistration ran
    Resumed,
    Retired { hooks_failed: usize },
}

pub struct CompletionHandler {
    workspace: Arc<dyn WorkspaceManager>,
    executor: Arc<dyn ExecutionBackend>,
    store: Arc<dyn TaskStore>,
    tracker: Option<Arc<dyn IssueTracker>>,
    hooks: Vec<Arc<dyn CompletionHook>>,
}

impl CompletionHandler {
    pub fn new(
        workspace: Arc<dyn WorkspaceManager>,
        executor: Arc<dyn ExecutionBackend>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            workspace,
            executor,
            store,
            tracker: None,
            hooks: Vec::new(),
        }
    }

    /// Report completed tasks back to the tracker as `Done`.
    pub fn with_tracker(mut self, tracker: Arc<dyn IssueTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn CompletionHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Retire `task_id` with `outcome`.
    ///
    /// Only a failure to persist the outcome or the active index is
    /// returned; the task then stays registered and the next delivery
    /// finishes the job. Hooks, agent shutdown, worktree removal and
    /// tracker updates are best effort.
    #[instrument(skip(self, registry), fields(task_id = %task_id, outcome = %outcome))]
    pub async fn complete(
        &self,
        registry: &mut ActiveSet,
        task_id: &str,
        outcome: Outcome,
    ) -> Result<CompletionReport, StoreError> {
        let Some(task) = registry.get(task_id).cloned() else {
            debug!("Task not active, ignoring repeated completion");
            return Ok(CompletionReport::AlreadyRetired);
        };

        let already_recorded = self
            .store
            .load_task(task_id)
            .await?
            .is_some_and(|t| t.is_terminal());

        if already_recorded {
            registry.remove(task_id).await?;
            info!("Resumed interrupted retirement");
            return Ok(CompletionReport::Resumed);
        }

        let mut task = task;
        task.retire(outcome);
        self.store.save_task(&task).await?;

        let hooks_failed = self.run_hooks(&task, outcome).await;

        if let Err(e) = self.executor.stop(&task.execution_handle).await {
            warn!(error = %e, "Could not stop execution context");
        }

        let delete_branch = outcome == Outcome::Completed;
        if let Err(e) = self
            .workspace
            .remove(&task.worktree_path, &task.branch, delete_branch)
            .await
        {
            warn!(error = %e, path = %task.worktree_path.display(), "Could not reclaim worktree");
        }

        if outcome == Outcome::Completed {
            if let Some(tracker) = &self.tracker {
                if let Err(e) = tracker.set_issue_state(&task.candidate_id, IssueState::Done).await {
                    warn!(candidate_id = %task.candidate_id, error = %e, "Could not mark issue done");
                }
            }
        }

        registry.remove(task_id).await?;
        info!(hooks_failed, "Task retired");
        Ok(CompletionReport::Retired { hooks_failed })
    }

    /// Run every hook in its own tokio task so a panicking hook is
    /// contained like a failing one.
    async fn run_hooks(&self, task: &Task, outcome: Outcome) -> usize {
        let mut failed = 0;
        for hook in &self.hooks {
            let hook = Arc::clone(hook);
            let name = hook.name().to_string();
            let task = task.clone();

            match tokio::spawn(async move { hook.run(&task, outcome).await }).await {
                Ok(Ok(())) => debug!(hook = %name, "Hook succeeded"),
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(hook = %name, error = %e, "Hook failed");
                }
                Err(join_err) => {
                    failed += 1;
                    error!(hook = %name, panicked = join_err.is_panic(), "Hook aborted");
                }
            }
        }
        failed
    }
}
