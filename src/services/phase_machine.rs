//! Phase state machine.
//!
//! Enforces `plan → implement → validate` ordering and persists every
//! transition. Phase records are written only through this service, from
//! the CLI (`complete`, `init`) or in-process callers.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::errors::PhaseError;
use crate::domain::models::{CheckCommands, Phase, PhaseState, Task, TaskStatus};
use crate::domain::ports::TaskStore;

pub struct PhaseStateMachine {
    store: Arc<dyn TaskStore>,
}

impl PhaseStateMachine {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Next pending phase, `None` once every phase is complete.
    pub fn next_phase(state: &PhaseState) -> Option<Phase> {
        state.next_pending()
    }

    /// Mark `phase` complete on an in-memory task and persist it.
    ///
    /// On an ordering error nothing changes. If persisting fails the
    /// in-memory state is rolled back so memory and disk agree.
    #[instrument(skip(self, task), fields(task_id = %task.id, phase = %phase))]
    pub async fn complete_phase(
        &self,
        task: &mut Task,
        phase: Phase,
    ) -> Result<Option<Phase>, PhaseError> {
        let previous = task.phase_state.clone();
        let next = task.phase_state.try_complete(phase)?;

        if let Err(e) = self.store.save_phase_state(&task.id, &task.phase_state).await {
            task.phase_state = previous;
            return Err(e.into());
        }

        info!(next = ?next, "Phase completed");
        Ok(next)
    }

    /// Mark `phase` complete for a task known only by id, reading and
    /// writing the persisted record.
    #[instrument(skip(self))]
    pub async fn complete_phase_by_id(
        &self,
        task_id: &str,
        phase: Phase,
    ) -> Result<Option<Phase>, PhaseError> {
        let mut state = self.load(task_id).await?;
        let next = state.try_complete(phase)?;
        self.store.save_phase_state(task_id, &state).await?;
        info!(next = ?next, "Phase completed");
        Ok(next)
    }

    pub async fn load(&self, task_id: &str) -> Result<PhaseState, PhaseError> {
        self.store
            .load_phase_state(task_id)
            .await?
            .ok_or_else(|| PhaseError::NotInitialized(task_id.to_string()))
    }

    /// Create (or with `force`, reset) the phase record for `task_id`.
    ///
    /// An existing record is kept unless `force` is set; its check commands
    /// are preserved across a reset when none are supplied.
    #[instrument(skip(self, checks))]
    pub async fn initialize(
        &self,
        task_id: &str,
        checks: Option<CheckCommands>,
        plan_path: Option<PathBuf>,
        force: bool,
    ) -> Result<PhaseState, PhaseError> {
        let existing = self.store.load_phase_state(task_id).await?;
        if existing.is_some() && !force {
            return Err(PhaseError::AlreadyInitialized(task_id.to_string()));
        }
        if existing.is_some() {
            warn!("Resetting existing phase state");
        }

        let checks = checks
            .or_else(|| existing.map(|s| s.checks))
            .unwrap_or_default();
        let mut state = PhaseState::new(checks);
        state.plan_path = plan_path;

        self.store.save_phase_state(task_id, &state).await?;
        info!("Phase state initialized");
        Ok(state)
    }
}

/// What a human (or agent) should do next for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NextAction {
    /// Write or approve the plan, then `complete --phase plan`
    ApprovePlan { plan_path: Option<PathBuf> },
    Implement,
    /// Run the snapshotted checks, then `complete --phase validate`
    Validate { checks: Vec<(String, String)> },
    /// Every phase done; open a pull request for the branch
    OpenPullRequest { branch: String },
    /// The execution context died after planning
    Investigate { branch: String },
    /// Nothing left to do
    Done { status: TaskStatus },
}

impl NextAction {
    pub fn for_task(task: &Task, phases: &PhaseState) -> Self {
        if task.is_terminal() {
            return Self::Done { status: task.status };
        }
        if task.status == TaskStatus::Stalled {
            return Self::Investigate {
                branch: task.branch.clone(),
            };
        }

        match phases.next_pending() {
            Some(Phase::Plan) => Self::ApprovePlan {
                plan_path: phases.plan_path.clone(),
            },
            Some(Phase::Implement) => Self::Implement,
            Some(Phase::Validate) => Self::Validate {
                checks: phases
                    .checks
                    .configured()
                    .into_iter()
                    .map(|(name, cmd)| (name.to_string(), cmd.to_string()))
                    .collect(),
            },
            None => Self::OpenPullRequest {
                branch: task.branch.clone(),
            },
        }
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApprovePlan { plan_path: Some(path) } => write!(
                f,
                "Review the plan at {} and run `mill complete --phase plan`",
                path.display()
            ),
            Self::ApprovePlan { plan_path: None } => {
                f.write_str("Write a plan and run `mill complete --phase plan`")
            }
            Self::Implement => f.write_str("Implement the plan, then `mill complete --phase implement`"),
            Self::Validate { checks } if checks.is_empty() => {
                f.write_str("Validate the change, then `mill complete --phase validate`")
            }
            Self::Validate { checks } => {
                let list: Vec<_> = checks.iter().map(|(_, cmd)| format!("`{cmd}`")).collect();
                write!(f, "Run {}, then `mill complete --phase validate`", list.join(", "))
            }
            Self::OpenPullRequest { branch } => write!(f, "Open a pull request for {branch}"),
            Self::Investigate { branch } => {
                write!(f, "Agent exited without a pull request; inspect {branch}")
            }
            Self::Done { status } => write!(f, "Nothing to do ({status})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::PhaseOrderError;
    use crate::domain::models::{ConflictKey, ExecutionHandle, Outcome};
    use crate::infrastructure::store::MemoryTaskStore;

    fn task() -> Task {
        Task::admitted(
            "hok-1-login",
            "HOK-1",
            "Login",
            "feature/hok-1-login",
            "/tmp/hok-1-login",
            ExecutionHandle("mill-hok-1-login".into()),
            ConflictKey::default(),
            PhaseState::default(),
        )
    }

    #[tokio::test]
    async fn test_complete_phase_persists() {
        let store = Arc::new(MemoryTaskStore::new());
        let machine = PhaseStateMachine::new(store.clone());
        let mut task = task();

        let next = machine.complete_phase(&mut task, Phase::Plan).await.unwrap();
        assert_eq!(next, Some(Phase::Implement));

        let persisted = store.load_phase_state(&task.id).await.unwrap().unwrap();
        assert!(persisted.plan_approved());
    }

    #[tokio::test]
    async fn test_out_of_order_rejected_without_change() {
        let store = Arc::new(MemoryTaskStore::new());
        let machine = PhaseStateMachine::new(store.clone());
        let mut task = task();

        let err = machine.complete_phase(&mut task, Phase::Validate).await.unwrap_err();
        assert!(matches!(
            err,
            PhaseError::Order(PhaseOrderError { phase: Phase::Validate, blocking: Phase::Plan })
        ));
        assert!(!task.phase_state.is_complete(Phase::Validate));
        assert!(store.load_phase_state(&task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_by_id_requires_initialization() {
        let store = Arc::new(MemoryTaskStore::new());
        let machine = PhaseStateMachine::new(store);

        let err = machine.complete_phase_by_id("missing", Phase::Plan).await.unwrap_err();
        assert!(matches!(err, PhaseError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_initialize_and_force_reset() {
        let store = Arc::new(MemoryTaskStore::new());
        let machine = PhaseStateMachine::new(store);
        let checks = CheckCommands {
            test: Some("cargo test".into()),
            ..Default::default()
        };

        machine
            .initialize("t", Some(checks.clone()), Some(PathBuf::from("PLAN.md")), false)
            .await
            .unwrap();
        machine.complete_phase_by_id("t", Phase::Plan).await.unwrap();

        let again = machine.initialize("t", None, None, false).await;
        assert!(matches!(again, Err(PhaseError::AlreadyInitialized(_))));

        let reset = machine.initialize("t", None, None, true).await.unwrap();
        assert!(!reset.plan_approved());
        assert_eq!(reset.checks, checks);
    }

    #[test]
    fn test_next_action_follows_phases() {
        let mut task = task();
        let mut phases = PhaseState::new(CheckCommands {
            lint: Some("cargo clippy".into()),
            ..Default::default()
        });

        assert!(matches!(NextAction::for_task(&task, &phases), NextAction::ApprovePlan { .. }));
        phases.try_complete(Phase::Plan).unwrap();
        assert_eq!(NextAction::for_task(&task, &phases), NextAction::Implement);
        phases.try_complete(Phase::Implement).unwrap();
        assert_eq!(
            NextAction::for_task(&task, &phases),
            NextAction::Validate {
                checks: vec![("lint".into(), "cargo clippy".into())]
            }
        );
        phases.try_complete(Phase::Validate).unwrap();
        assert!(matches!(
            NextAction::for_task(&task, &phases),
            NextAction::OpenPullRequest { .. }
        ));

        task.set_status(TaskStatus::Stalled);
        assert!(matches!(NextAction::for_task(&task, &phases), NextAction::Investigate { .. }));

        task.retire(Outcome::Completed);
        assert_eq!(
            NextAction::for_task(&task, &phases),
            NextAction::Done { status: TaskStatus::Completed }
        );
    }
}
