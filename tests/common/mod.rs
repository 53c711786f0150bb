//! Common test utilities for integration tests
//!
//! Hand-written mock collaborators backed by `std::sync::Mutex` state and
//! atomic counters, plus fixtures for seeding tasks.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mill::application::{Collaborators, Orchestrator};
use mill::domain::errors::{ExecutionError, HookError, TrackerError, WorkspaceError};
use mill::domain::models::{
    Candidate, Config, ConflictKey, ExecutionHandle, IssueState, Outcome, Phase, PhaseState,
    PrLookup, PrState, Task, TaskStatus,
};
use mill::domain::ports::{
    CodeHost, CompletionHook, ExecutionBackend, ExecutionSpec, IssueTracker, TaskStore,
    WorkspaceManager,
};
use mill::infrastructure::MemoryTaskStore;

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// ---------------------------------------------------------------------------
// Issue tracker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockTracker {
    pub backlog: Mutex<Vec<Candidate>>,
    pub unreachable: AtomicBool,
    pub updates: Mutex<Vec<(String, IssueState)>>,
    pub list_calls: AtomicUsize,
}

impl MockTracker {
    pub fn with_backlog(backlog: Vec<Candidate>) -> Self {
        Self {
            backlog: Mutex::new(backlog),
            ..Default::default()
        }
    }

    pub fn updates_for(&self, id: &str) -> Vec<IssueState> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| i == id)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    async fn list_backlog(&self, _project: &str) -> Result<Vec<Candidate>, TrackerError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TrackerError::Unreachable("mock tracker offline".into()));
        }
        Ok(self.backlog.lock().unwrap().clone())
    }

    async fn get_issue_state(&self, id: &str) -> Result<IssueState, TrackerError> {
        self.backlog
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.state.clone())
            .ok_or_else(|| TrackerError::IssueNotFound(id.to_string()))
    }

    async fn set_issue_state(&self, id: &str, state: IssueState) -> Result<(), TrackerError> {
        self.updates.lock().unwrap().push((id.to_string(), state.clone()));
        if let Some(c) = self.backlog.lock().unwrap().iter_mut().find(|c| c.id == id) {
            c.state = state;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Code host
// ---------------------------------------------------------------------------

/// PR states scripted per branch. Unscripted branches have no PR.
#[derive(Default)]
pub struct MockCodeHost {
    prs: Mutex<HashMap<String, PrLookup>>,
    panics: Mutex<HashSet<String>>,
    hangs: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockCodeHost {
    pub fn set_pr(&self, branch: &str, state: PrState) {
        let lookup = PrLookup::new(state, Some(format!("https://example.com/pr/{branch}")), Some(1));
        self.prs.lock().unwrap().insert(branch.to_string(), lookup);
    }

    pub fn panic_for(&self, branch: &str) {
        self.panics.lock().unwrap().insert(branch.to_string());
    }

    pub fn heal(&self, branch: &str) {
        self.panics.lock().unwrap().remove(branch);
        self.hangs.lock().unwrap().remove(branch);
    }

    pub fn hang_for(&self, branch: &str) {
        self.hangs.lock().unwrap().insert(branch.to_string());
    }

    pub fn calls_for(&self, branch: &str) -> usize {
        self.calls.lock().unwrap().get(branch).copied().unwrap_or(0)
    }
}

#[async_trait]
impl CodeHost for MockCodeHost {
    async fn find_pr(&self, branch: &str) -> PrLookup {
        *self.calls.lock().unwrap().entry(branch.to_string()).or_default() += 1;

        if self.panics.lock().unwrap().contains(branch) {
            panic!("code host blew up for {branch}");
        }
        let hang = self.hangs.lock().unwrap().contains(branch);
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.prs
            .lock()
            .unwrap()
            .get(branch)
            .cloned()
            .unwrap_or_else(PrLookup::none)
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockWorkspace {
    pub created: Mutex<Vec<(String, PathBuf)>>,
    pub removed: Mutex<Vec<(PathBuf, String, bool)>>,
    pub fail_create: AtomicBool,
}

impl MockWorkspace {
    pub fn removed_branches(&self) -> Vec<(String, bool)> {
        self.removed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, b, d)| (b.clone(), *d))
            .collect()
    }
}

#[async_trait]
impl WorkspaceManager for MockWorkspace {
    async fn preflight(&self) -> Result<(), WorkspaceError> {
        Ok(())
    }

    async fn create(&self, branch: &str, path: &Path, _base: &str) -> Result<(), WorkspaceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(WorkspaceError::CreateFailed {
                path: path.display().to_string(),
                reason: "disk full".into(),
            });
        }
        self.created
            .lock()
            .unwrap()
            .push((branch.to_string(), path.to_path_buf()));
        Ok(())
    }

    async fn remove(&self, path: &Path, branch: &str, delete_branch: bool) -> Result<(), WorkspaceError> {
        self.removed
            .lock()
            .unwrap()
            .push((path.to_path_buf(), branch.to_string(), delete_branch));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Execution backend
// ---------------------------------------------------------------------------

/// Started contexts are alive until `kill` is called.
#[derive(Default)]
pub struct MockExecutor {
    pub started: Mutex<Vec<ExecutionSpec>>,
    pub stopped: Mutex<Vec<String>>,
    alive: Mutex<HashMap<String, bool>>,
    pub fail_start: AtomicBool,
}

impl MockExecutor {
    pub fn set_alive(&self, handle: &str, alive: bool) {
        self.alive.lock().unwrap().insert(handle.to_string(), alive);
    }

    pub fn kill(&self, handle: &str) {
        self.set_alive(handle, false);
    }
}

#[async_trait]
impl ExecutionBackend for MockExecutor {
    async fn preflight(&self) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn start(&self, spec: &ExecutionSpec) -> Result<ExecutionHandle, ExecutionError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ExecutionError::StartFailed {
                handle: spec.handle.to_string(),
                reason: "tmux exploded".into(),
            });
        }
        self.started.lock().unwrap().push(spec.clone());
        self.set_alive(spec.handle.as_str(), true);
        Ok(spec.handle.clone())
    }

    async fn is_alive(&self, handle: &ExecutionHandle) -> Result<bool, ExecutionError> {
        Ok(self
            .alive
            .lock()
            .unwrap()
            .get(handle.as_str())
            .copied()
            .unwrap_or(false))
    }

    async fn stop(&self, handle: &ExecutionHandle) -> Result<(), ExecutionError> {
        self.stopped.lock().unwrap().push(handle.to_string());
        self.set_alive(handle.as_str(), false);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingHook {
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(String, Outcome)>>,
}

#[async_trait]
impl CompletionHook for CountingHook {
    fn name(&self) -> &str {
        "counting"
    }

    async fn run(&self, task: &Task, outcome: Outcome) -> Result<(), HookError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((task.id.clone(), outcome));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Config tuned for fast tests: no stall grace, one-second query timeout.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.max_parallel = 3;
    config.monitor.poll_interval_secs = 1;
    config.monitor.stall_grace_secs = 0;
    config.monitor.query_timeout_secs = 1;
    config
}

pub struct Harness {
    pub tracker: Arc<MockTracker>,
    pub code_host: Arc<MockCodeHost>,
    pub workspace: Arc<MockWorkspace>,
    pub executor: Arc<MockExecutor>,
    pub store: Arc<MemoryTaskStore>,
    pub hook: Arc<CountingHook>,
}

impl Harness {
    pub fn new(backlog: Vec<Candidate>) -> Self {
        Self {
            tracker: Arc::new(MockTracker::with_backlog(backlog)),
            code_host: Arc::new(MockCodeHost::default()),
            workspace: Arc::new(MockWorkspace::default()),
            executor: Arc::new(MockExecutor::default()),
            store: Arc::new(MemoryTaskStore::new()),
            hook: Arc::new(CountingHook::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            tracker: self.tracker.clone(),
            code_host: self.code_host.clone(),
            workspace: self.workspace.clone(),
            executor: self.executor.clone(),
            store: self.store.clone(),
            hooks: vec![self.hook.clone() as Arc<dyn CompletionHook>],
        }
    }

    pub async fn orchestrator(&self, config: &Config) -> Orchestrator {
        Orchestrator::assemble(config, self.collaborators())
            .await
            .expect("assemble orchestrator")
    }

    /// Persist a task as if it had been launched earlier, with its agent
    /// context alive.
    pub async fn seed(&self, task: &Task, plan_approved: bool) {
        let mut phases = PhaseState::default();
        if plan_approved {
            phases.phases.insert(Phase::Plan, mill::domain::models::PhaseStatus::Complete);
        }
        self.store.save_task(task).await.unwrap();
        self.store.save_phase_state(&task.id, &phases).await.unwrap();

        let mut index = self.store.load_active_index().await.unwrap();
        index.push(task.id.clone());
        self.store.save_active_index(&index).await.unwrap();

        self.executor.set_alive(task.execution_handle.as_str(), true);
    }
}

/// An active task with branch `feature/<id>` and handle `mill-<id>`.
pub fn active_task(id: &str, labels: &[&str]) -> Task {
    let mut task = Task::admitted(
        id,
        id.to_uppercase(),
        format!("Work on {id}"),
        format!("feature/{id}"),
        format!(".mill/worktrees/{id}"),
        ExecutionHandle(format!("mill-{id}")),
        ConflictKey::from_labels(labels),
        PhaseState::default(),
    );
    task.set_status(TaskStatus::Active);
    task
}

pub fn branch(id: &str) -> String {
    format!("feature/{id}")
}
