//! Admission: ranked candidates → launched tasks.
//!
//! The active-set lock is held across evaluate, launch and register, so two
//! admissions can never both take the last slot.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::application::active_set::ActiveSet;
use crate::domain::errors::RankingError;
use crate::domain::models::{ConflictKey, IssueState};
use crate::domain::ports::IssueTracker;
use crate::services::{
    BacklogRanker, CapacityDenial, CapacityManager, ConflictDetector, ConflictReason, TaskLauncher,
};

/// Why a candidate waits for a later cycle. Not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DeferReason {
    Capacity(CapacityDenial),
    Conflict(ConflictReason),
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacity(denial) => write!(f, "{denial}"),
            Self::Conflict(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Deferred(DeferReason),
}

/// Outcome of one admission pass.
#[derive(Debug, Default, Serialize)]
pub struct AdmissionReport {
    pub launched: Vec<String>,
    pub deferred: Vec<(String, DeferReason)>,
    pub failed: Vec<(String, String)>,
}

pub struct AdmissionController {
    tracker: Arc<dyn IssueTracker>,
    ranker: BacklogRanker,
    launcher: Arc<TaskLauncher>,
    capacity: CapacityManager,
    conflicts: ConflictDetector,
    registry: Arc<Mutex<ActiveSet>>,
    project: String,
}

impl AdmissionController {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        ranker: BacklogRanker,
        launcher: Arc<TaskLauncher>,
        capacity: CapacityManager,
        registry: Arc<Mutex<ActiveSet>>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            ranker,
            launcher,
            capacity,
            conflicts: ConflictDetector::new(),
            registry,
            project: project.into(),
        }
    }

    /// Capacity first, then conflicts. Admissible iff both pass.
    pub fn evaluate(&self, key: &ConflictKey, active: &ActiveSet) -> Admission {
        if let Err(denial) = self.capacity.can_admit(key, active.tasks()) {
            return Admission::Deferred(DeferReason::Capacity(denial));
        }
        if let Some(reason) = self.conflicts.would_conflict(key, active.tasks()) {
            return Admission::Deferred(DeferReason::Conflict(reason));
        }
        Admission::Admit
    }

    /// Rank the backlog and launch candidates until capacity runs out.
    ///
    /// Only an unreachable backlog source is an error. Deferred candidates
    /// and failed launches are reported and retried next cycle.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn fill(&self) -> Result<AdmissionReport, RankingError> {
        let mut report = AdmissionReport::default();

        if !self.capacity.has_free_slot(self.registry.lock().await.len()) {
            debug!("No free slots, skipping ranking");
            return Ok(report);
        }

        let ranked = self.ranker.fetch_and_rank(self.tracker.as_ref(), &self.project).await?;

        let mut registry = self.registry.lock().await;
        for entry in ranked {
            if !self.capacity.has_free_slot(registry.len()) {
                break;
            }

            let candidate = &entry.candidate;
            if registry.contains_candidate(&candidate.id) {
                continue;
            }

            let key = ConflictKey::from_labels(&candidate.labels);
            if let Admission::Deferred(reason) = self.evaluate(&key, &registry) {
                debug!(candidate_id = %candidate.id, reason = %reason, "Candidate deferred");
                report.deferred.push((candidate.id.clone(), reason));
                continue;
            }

            let task = match self.launcher.launch(candidate, key).await {
                Ok(task) => task,
                Err(e) => {
                    warn!(candidate_id = %candidate.id, error = %e, "Launch failed");
                    report.failed.push((candidate.id.clone(), e.to_string()));
                    continue;
                }
            };

            let task_id = task.id.clone();
            if let Err(e) = registry.insert(task.clone()).await {
                error!(task_id = %task_id, error = %e, "Could not register task, rolling back launch");
                self.launcher.rollback(&task).await;
                report.failed.push((candidate.id.clone(), e.to_string()));
                continue;
            }

            if let Err(e) = self
                .tracker
                .set_issue_state(&candidate.id, IssueState::InProgress)
                .await
            {
                warn!(candidate_id = %candidate.id, error = %e, "Could not mark issue in progress");
            }

            info!(task_id = %task_id, candidate_id = %candidate.id, score = entry.score, "Admitted");
            report.launched.push(task_id);
        }

        Ok(report)
    }
}
