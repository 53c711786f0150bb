//! Task domain model.
//!
//! A task is one backlog item being worked by an agent under orchestrator
//! supervision. It is created by the launcher, mutated only by the monitor
//! loop and the completion handler, and retired by the completion handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::conflict_key::ConflictKey;
use super::phase::PhaseState;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Workspace created and record persisted, execution not yet confirmed
    Admitted,
    /// Agent running
    Active,
    /// PR merged
    Completed,
    /// Retired as a failure
    Failed,
    /// PR closed without merge
    Abandoned,
    /// No PR, plan approved, and the execution context is gone
    Stalled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
            Self::Stalled => "stalled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admitted" => Some(Self::Admitted),
            "active" => Some(Self::Active),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "abandoned" => Some(Self::Abandoned),
            "stalled" => Some(Self::Stalled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome handed to the completion handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Abandoned,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Failed => "failed",
        }
    }

    pub fn status(self) -> TaskStatus {
        match self {
            Self::Completed => TaskStatus::Completed,
            Self::Abandoned => TaskStatus::Abandoned,
            Self::Failed => TaskStatus::Failed,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a running agent context. Only ever used to ask
/// whether the context is still alive, or to stop it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(pub String);

impl ExecutionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A task owned by the orchestrator.
///
/// `phase_state` lives in its own record (see the task store), so it is
/// skipped when the task metadata is serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Slug, also the branch name without its prefix
    pub id: String,
    pub candidate_id: String,
    pub title: String,
    pub branch: String,
    pub worktree_path: PathBuf,
    pub execution_handle: ExecutionHandle,
    pub conflict_key: ConflictKey,
    #[serde(skip)]
    pub phase_state: PhaseState,
    pub status: TaskStatus,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A freshly admitted task.
    #[allow(clippy::too_many_arguments)]
    pub fn admitted(
        id: impl Into<String>,
        candidate_id: impl Into<String>,
        title: impl Into<String>,
        branch: impl Into<String>,
        worktree_path: impl Into<PathBuf>,
        execution_handle: ExecutionHandle,
        conflict_key: ConflictKey,
        phase_state: PhaseState,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            candidate_id: candidate_id.into(),
            title: title.into(),
            branch: branch.into(),
            worktree_path: worktree_path.into(),
            execution_handle,
            conflict_key,
            phase_state,
            status: TaskStatus::Admitted,
            outcome: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a non-terminal status.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Record the terminal outcome.
    pub fn retire(&mut self, outcome: Outcome) {
        let now = Utc::now();
        self.status = outcome.status();
        self.outcome = Some(outcome);
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}
