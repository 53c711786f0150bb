//! Backlog candidate domain model.
//!
//! A candidate is a read-only snapshot of a backlog item as reported by the
//! issue tracker. It is never mutated after ranking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::external::IssueState;

/// Priority tier reported by the issue tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Urgent,
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }

    /// Priority normalized into `[0.0, 1.0]`, higher is more urgent.
    pub fn normalized(&self) -> f64 {
        match self {
            Self::Urgent => 1.0,
            Self::High => 0.75,
            Self::Medium => 0.5,
            Self::Low => 0.25,
            Self::None => 0.0,
        }
    }
}

/// An item from the backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Tracker identifier (e.g. `HOK-123`)
    pub id: String,
    /// Issue title
    pub title: String,
    /// Raw label strings; conflict keys are parsed from these
    #[serde(default)]
    pub labels: Vec<String>,
    /// Size estimate (points); smaller unblocks faster
    #[serde(default)]
    pub estimate: Option<f64>,
    /// Priority tier
    #[serde(default)]
    pub priority: PriorityTier,
    /// Identifiers of items blocking this one
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// When the item was created in the tracker
    pub created_at: DateTime<Utc>,
    /// Workflow state in the tracker
    #[serde(default)]
    pub state: IssueState,
    /// Parent epic, if any
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Candidate {
    /// Create a candidate in the `Backlog` state with no labels.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            labels: Vec::new(),
            estimate: None,
            priority: PriorityTier::None,
            dependencies: Vec::new(),
            created_at: Utc::now(),
            state: IssueState::Backlog,
            parent_id: None,
        }
    }

    /// Builder-style label setter.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style priority setter.
    pub fn with_priority(mut self, priority: PriorityTier) -> Self {
        self.priority = priority;
        self
    }

    /// Builder-style estimate setter.
    pub fn with_estimate(mut self, estimate: f64) -> Self {
        self.estimate = Some(estimate);
        self
    }

    /// Builder-style dependency setter.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_sub_issue(&self) -> bool {
        self.parent_id.is_some()
    }
}
