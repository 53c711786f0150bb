//! Monitor loop.
//!
//! Once per poll interval, reconciles every task in the active set with
//! external reality. Each task's check runs in its own tokio task under a
//! timeout, so an error, a hang or a panic in one check is logged with the
//! task id and the step it was on, and every other task is still
//! reconciled. Observations are gathered concurrently and applied one at a
//! time under the active-set lock.
//!
//! Resolution order per task, every cycle:
//! 1. PR state for the branch, across open, merged and closed PRs
//! 2. `MERGED` → retire as completed; `CLOSED` → retire as abandoned
//! 3. `OPEN` → still working
//! 4. no PR: the plan gate first. An unapproved plan means the task is
//!    waiting on a human and stays active whatever the agent is doing.
//!    The exception is a task still `Admitted`: its launch may have died
//!    before the agent started, so it is retired as failed once its
//!    context has been gone longer than the grace period.
//! 5. no PR, plan approved: the execution context must be alive; once it
//!    has been gone longer than the grace period the task is stalled
//!
//! An `Unknown` PR lookup means "no information this cycle".

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::application::active_set::ActiveSet;
use crate::application::admission::AdmissionController;
use crate::application::completion_handler::CompletionHandler;
use crate::application::stop_signal::StopSignal;
use crate::domain::models::{MonitorConfig, Outcome, PrLookup, PrState, Task, TaskStatus};
use crate::domain::ports::{CodeHost, ExecutionBackend, TaskStore};

/// Step a task check was on, kept for diagnosing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CheckStage {
    Queued = 0,
    QueryPullRequest = 1,
    ReadPhaseState = 2,
    CheckLiveness = 3,
    Done = 4,
}

impl CheckStage {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::QueryPullRequest,
            2 => Self::ReadPhaseState,
            3 => Self::CheckLiveness,
            4 => Self::Done,
            _ => Self::Queued,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::QueryPullRequest => "query_pull_request",
            Self::ReadPhaseState => "read_phase_state",
            Self::CheckLiveness => "check_liveness",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Default)]
struct StageTracker(AtomicU8);

impl StageTracker {
    fn set(&self, stage: CheckStage) {
        self.0.store(stage as u8, Ordering::Relaxed);
    }

    fn get(&self) -> CheckStage {
        CheckStage::from_u8(self.0.load(Ordering::Relaxed))
    }
}

/// What one cycle learned about a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Merged(PrLookup),
    Closed(PrLookup),
    PullRequestOpen,
    /// No PR and the plan is not approved yet
    AwaitingPlan,
    /// No PR, plan approved, agent running
    Alive,
    /// No PR, plan approved, agent gone
    ContextGone,
    /// Still `Admitted` with no running agent: the launch never finished
    NeverStarted,
    /// Nothing reliable this cycle
    NoInformation,
}

/// Summary of one reconciliation cycle.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CycleReport {
    pub checked: usize,
    pub retired: Vec<(String, Outcome)>,
    pub stalled: Vec<String>,
    pub revived: Vec<String>,
    /// Tasks whose check or update failed; retried next cycle
    pub failed: Vec<String>,
}

/// Read-only collaborators a task check needs. Cloned into each spawned
/// check.
#[derive(Clone)]
struct Observer {
    code_host: Arc<dyn CodeHost>,
    executor: Arc<dyn ExecutionBackend>,
    store: Arc<dyn TaskStore>,
    query_timeout: Duration,
}

impl Observer {
    async fn observe(&self, task: &Task, stage: &StageTracker) -> anyhow::Result<Observation> {
        stage.set(CheckStage::QueryPullRequest);
        let lookup = match timeout(self.query_timeout, self.code_host.find_pr(&task.branch)).await {
            Ok(lookup) => lookup,
            Err(_) => {
                warn!(task_id = %task.id, "PR lookup timed out");
                PrLookup::unknown()
            }
        };

        let observation = match lookup.state {
            PrState::Merged => Observation::Merged(lookup),
            PrState::Closed => Observation::Closed(lookup),
            PrState::Open => Observation::PullRequestOpen,
            PrState::Unknown => Observation::NoInformation,
            PrState::None => {
                stage.set(CheckStage::ReadPhaseState);
                let phases = self.store.load_phase_state(&task.id).await?.unwrap_or_else(|| {
                    warn!(task_id = %task.id, "No persisted phase state, using launch snapshot");
                    task.phase_state.clone()
                });

                let admitted = task.status == TaskStatus::Admitted;
                if !phases.plan_approved() && !admitted {
                    Observation::AwaitingPlan
                } else {
                    stage.set(CheckStage::CheckLiveness);
                    match self.liveness(task).await {
                        Some(true) if phases.plan_approved() => Observation::Alive,
                        Some(true) => Observation::AwaitingPlan,
                        Some(false) if admitted => Observation::NeverStarted,
                        Some(false) => Observation::ContextGone,
                        None => Observation::NoInformation,
                    }
                }
            }
        };

        stage.set(CheckStage::Done);
        Ok(observation)
    }

    /// `None` when the backend could not say.
    async fn liveness(&self, task: &Task) -> Option<bool> {
        match timeout(self.query_timeout, self.executor.is_alive(&task.execution_handle)).await {
            Ok(Ok(alive)) => Some(alive),
            Ok(Err(e)) => {
                warn!(task_id = %task.id, error = %e, "Liveness query failed");
                None
            }
            Err(_) => {
                warn!(task_id = %task.id, "Liveness query timed out");
                None
            }
        }
    }
}

pub struct MonitorLoop {
    registry: Arc<Mutex<ActiveSet>>,
    completion: Arc<CompletionHandler>,
    observer: Observer,
    config: MonitorConfig,
    /// When each task's execution context was first seen dead
    dead_since: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MonitorLoop {
    pub fn new(
        registry: Arc<Mutex<ActiveSet>>,
        code_host: Arc<dyn CodeHost>,
        executor: Arc<dyn ExecutionBackend>,
        store: Arc<dyn TaskStore>,
        completion: Arc<CompletionHandler>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            completion,
            observer: Observer {
                code_host,
                executor,
                store,
                query_timeout: config.query_timeout(),
            },
            config,
            dead_since: Mutex::new(HashMap::new()),
        }
    }

    /// Run until `stop` fires. With an admission controller, each cycle is
    /// followed by an admission pass.
    ///
    /// The stop signal is checked between cycles only; a cycle in progress
    /// always finishes its checks. Returns the number of cycles run.
    pub async fn run(&self, stop: &StopSignal, admission: Option<&AdmissionController>) -> u64 {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            admitting = admission.is_some(),
            "Monitor loop started"
        );

        let mut cycle: u64 = 0;
        loop {
            if stop.is_requested() {
                break;
            }
            cycle += 1;

            let report = self.run_cycle().await;
            debug!(
                cycle,
                checked = report.checked,
                retired = report.retired.len(),
                stalled = report.stalled.len(),
                failed = report.failed.len(),
                "Cycle complete"
            );

            // No new work once a stop has been requested mid-cycle.
            if let Some(admission) = admission.filter(|_| !stop.is_requested()) {
                match AssertUnwindSafe(admission.fill()).catch_unwind().await {
                    Ok(Ok(admitted)) if !admitted.launched.is_empty() => {
                        info!(cycle, launched = ?admitted.launched, "Admitted new tasks");
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(cycle, error = %e, "Admission skipped this cycle"),
                    Err(_) => error!(cycle, "Admission pass panicked, continuing"),
                }
            }

            if stop.sleep(self.config.poll_interval()).await {
                break;
            }
        }

        info!(cycles = cycle, "Monitor loop stopped");
        cycle
    }

    /// Reconcile every task in the active set once.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleReport {
        let tasks = self.registry.lock().await.snapshot();
        let mut report = CycleReport {
            checked: tasks.len(),
            ..Default::default()
        };

        // Generous outer bound: the inner queries already time out.
        let check_deadline = self.observer.query_timeout * 3;

        let checks: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let stage = Arc::new(StageTracker::default());
                let observer = self.observer.clone();
                let id = task.id.clone();
                let handle = tokio::spawn({
                    let stage = Arc::clone(&stage);
                    async move { timeout(check_deadline, observer.observe(&task, &stage)).await }
                });
                (id, stage, handle)
            })
            .collect();

        for (task_id, stage, handle) in checks {
            let observation = match handle.await {
                Ok(Ok(Ok(observation))) => observation,
                Ok(Ok(Err(e))) => {
                    error!(task_id = %task_id, stage = stage.get().as_str(), error = ?e, "Task check failed");
                    report.failed.push(task_id);
                    continue;
                }
                Ok(Err(_elapsed)) => {
                    error!(task_id = %task_id, stage = stage.get().as_str(), "Task check timed out");
                    report.failed.push(task_id);
                    continue;
                }
                Err(join_err) => {
                    error!(
                        task_id = %task_id,
                        stage = stage.get().as_str(),
                        panicked = join_err.is_panic(),
                        error = %join_err,
                        "Task check aborted"
                    );
                    report.failed.push(task_id);
                    continue;
                }
            };

            match AssertUnwindSafe(self.apply(&task_id, observation, &mut report))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(task_id = %task_id, error = ?e, "Applying check result failed");
                    report.failed.push(task_id);
                }
                Err(_) => {
                    error!(task_id = %task_id, "Applying check result panicked");
                    report.failed.push(task_id);
                }
            }
        }

        report
    }

    async fn apply(
        &self,
        task_id: &str,
        observation: Observation,
        report: &mut CycleReport,
    ) -> anyhow::Result<()> {
        let mut registry = self.registry.lock().await;
        let Some(task) = registry.get(task_id).cloned() else {
            debug!(task_id, "Task left the active set during the cycle");
            return Ok(());
        };

        match observation {
            Observation::Merged(pr) | Observation::Closed(pr) => {
                let outcome = if pr.state == PrState::Merged {
                    Outcome::Completed
                } else {
                    Outcome::Abandoned
                };
                info!(task_id, pr_url = ?pr.url, outcome = %outcome, "Pull request resolved");
                self.dead_since.lock().await.remove(task_id);
                self.completion.complete(&mut registry, task_id, outcome).await?;
                report.retired.push((task_id.to_string(), outcome));
            }
            Observation::PullRequestOpen | Observation::AwaitingPlan | Observation::Alive => {
                self.dead_since.lock().await.remove(task_id);
                if task.status != TaskStatus::Active {
                    let previous = task.status;
                    let mut task = task;
                    task.set_status(TaskStatus::Active);
                    registry.update(task).await?;
                    info!(task_id, from = %previous, "Task active");
                    report.revived.push(task_id.to_string());
                }
            }
            Observation::NeverStarted => {
                let dead_for = self.dead_for(task_id).await;
                if dead_for >= self.config.stall_grace() {
                    warn!(task_id, dead_for_secs = dead_for.as_secs(), "Launch never started an agent, retiring as failed");
                    self.dead_since.lock().await.remove(task_id);
                    self.completion.complete(&mut registry, task_id, Outcome::Failed).await?;
                    report.retired.push((task_id.to_string(), Outcome::Failed));
                } else {
                    debug!(task_id, dead_for_secs = dead_for.as_secs(), "Admitted without an agent, within grace period");
                }
            }
            Observation::ContextGone => {
                let dead_for = self.dead_for(task_id).await;
                if task.status == TaskStatus::Stalled {
                    debug!(task_id, "Still stalled");
                } else if dead_for >= self.config.stall_grace() {
                    let mut task = task;
                    task.set_status(TaskStatus::Stalled);
                    registry.update(task).await?;
                    warn!(task_id, dead_for_secs = dead_for.as_secs(), "Execution context gone without a pull request, task stalled");
                    report.stalled.push(task_id.to_string());
                } else {
                    debug!(task_id, dead_for_secs = dead_for.as_secs(), "Execution context gone, within grace period");
                }
            }
            Observation::NoInformation => {
                debug!(task_id, "No information this cycle");
            }
        }

        Ok(())
    }

    /// How long the task's context has been seen dead, starting the clock
    /// on first sight.
    async fn dead_for(&self, task_id: &str) -> Duration {
        let now = Utc::now();
        let first_seen = *self
            .dead_since
            .lock()
            .await
            .entry(task_id.to_string())
            .or_insert(now);
        (now - first_seen).to_std().unwrap_or_default()
    }
}
