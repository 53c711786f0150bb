//! Phase domain model.
//!
//! Every task moves through `plan → implement → validate`. Completion is
//! monotonic: a phase can only be marked complete once all of its
//! predecessors are.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::domain::errors::PhaseOrderError;

/// One step of the per-task workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Plan,
    Implement,
    Validate,
}

impl Phase {
    pub const ALL: [Self; 3] = [Self::Plan, Self::Implement, Self::Validate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Implement => "implement",
            Self::Validate => "validate",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "plan" => Some(Self::Plan),
            "implement" | "implementation" => Some(Self::Implement),
            "validate" | "validation" => Some(Self::Validate),
            _ => None,
        }
    }

    /// Phases that must be complete before this one.
    pub fn predecessors(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().take_while(move |p| *p < self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Complete,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
        }
    }
}

/// Check commands snapshotted when the task was launched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckCommands {
    #[serde(default)]
    pub test: Option<String>,
    #[serde(default)]
    pub lint: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub typecheck: Option<String>,
}

impl CheckCommands {
    /// Configured commands as `(name, command)` pairs.
    pub fn configured(&self) -> Vec<(&'static str, &str)> {
        [
            ("test", &self.test),
            ("lint", &self.lint),
            ("build", &self.build),
            ("typecheck", &self.typecheck),
        ]
        .into_iter()
        .filter_map(|(name, cmd)| cmd.as_deref().map(|c| (name, c)))
        .collect()
    }
}

/// Per-task phase progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub phases: BTreeMap<Phase, PhaseStatus>,
    #[serde(default)]
    pub checks: CheckCommands,
    /// Plan document recorded by `init --plan`
    #[serde(default)]
    pub plan_path: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new(CheckCommands::default())
    }
}

impl PhaseState {
    /// All phases pending, with a snapshot of the check commands.
    pub fn new(checks: CheckCommands) -> Self {
        Self {
            phases: Phase::ALL.into_iter().map(|p| (p, PhaseStatus::Pending)).collect(),
            checks,
            plan_path: None,
            updated_at: Utc::now(),
        }
    }

    pub fn status(&self, phase: Phase) -> PhaseStatus {
        self.phases.get(&phase).copied().unwrap_or_default()
    }

    pub fn is_complete(&self, phase: Phase) -> bool {
        self.status(phase) == PhaseStatus::Complete
    }

    /// The plan counts as approved once the plan phase is complete.
    pub fn plan_approved(&self) -> bool {
        self.is_complete(Phase::Plan)
    }

    /// First phase still pending, in order.
    pub fn next_pending(&self) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| !self.is_complete(*p))
    }

    pub fn all_complete(&self) -> bool {
        self.next_pending().is_none()
    }

    /// Mark `phase` complete if every predecessor is. Leaves the state
    /// untouched on error. Persisting is the caller's job.
    pub(crate) fn try_complete(&mut self, phase: Phase) -> Result<Option<Phase>, PhaseOrderError> {
        if let Some(blocking) = phase.predecessors().find(|p| !self.is_complete(*p)) {
            return Err(PhaseOrderError { phase, blocking });
        }
        self.phases.insert(phase, PhaseStatus::Complete);
        self.updated_at = Utc::now();
        Ok(self.next_pending())
    }
}
