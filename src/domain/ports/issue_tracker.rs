//! Issue tracker port.

use async_trait::async_trait;

use crate::domain::errors::TrackerError;
use crate::domain::models::{Candidate, IssueState};

/// Typed access to the backlog source.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Every candidate in `project` (empty = all projects), unfiltered.
    async fn list_backlog(&self, project: &str) -> Result<Vec<Candidate>, TrackerError>;

    /// Current workflow state of an issue.
    async fn get_issue_state(&self, id: &str) -> Result<IssueState, TrackerError>;

    /// Move an issue to a new workflow state.
    async fn set_issue_state(&self, id: &str, state: IssueState) -> Result<(), TrackerError>;
}
