//! Values reported by external collaborators (issue tracker, code host).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow state of an issue in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueState {
    #[default]
    Backlog,
    Todo,
    InProgress,
    InReview,
    Done,
    Canceled,
    /// Any tracker-specific state we do not model
    Other(String),
}

impl IssueState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Backlog => "Backlog",
            Self::Todo => "Todo",
            Self::InProgress => "In Progress",
            Self::InReview => "In Review",
            Self::Done => "Done",
            Self::Canceled => "Canceled",
            Self::Other(name) => name,
        }
    }

    /// Parse a tracker state name, case-insensitively.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "backlog" => Self::Backlog,
            "todo" | "to do" => Self::Todo,
            "in progress" | "in_progress" | "started" => Self::InProgress,
            "in review" | "in_review" => Self::InReview,
            "done" | "completed" | "closed" | "merged" => Self::Done,
            "canceled" | "cancelled" | "duplicate" => Self::Canceled,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    /// A resolved issue no longer blocks its dependents.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }

    /// Case-insensitive comparison against a configured state name.
    pub fn matches_name(&self, name: &str) -> bool {
        *self == Self::from_name(name)
    }
}

impl From<String> for IssueState {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<IssueState> for String {
    fn from(value: IssueState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the pull request for a task branch.
///
/// `Unknown` is the non-fatal sentinel for a failed query: it carries no
/// information and is never treated as terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrState {
    Open,
    Merged,
    Closed,
    None,
    Unknown,
}

impl PrState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
            Self::Closed => "CLOSED",
            Self::None => "NONE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a code-host state string. Unrecognized values map to `Unknown`.
    pub fn from_host(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "OPEN" => Self::Open,
            "MERGED" => Self::Merged,
            "CLOSED" => Self::Closed,
            _ => Self::Unknown,
        }
    }

    /// Rank used to pick one state when a branch has several PRs.
    fn precedence(self) -> u8 {
        match self {
            Self::Merged => 3,
            Self::Open => 2,
            Self::Closed => 1,
            Self::None | Self::Unknown => 0,
        }
    }
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of looking up the pull request for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrLookup {
    pub state: PrState,
    pub url: Option<String>,
    pub number: Option<u64>,
}

impl PrLookup {
    pub fn new(state: PrState, url: Option<String>, number: Option<u64>) -> Self {
        Self { state, url, number }
    }

    /// No pull request exists for the branch.
    pub fn none() -> Self {
        Self::new(PrState::None, None, None)
    }

    /// The query failed; retry next cycle.
    pub fn unknown() -> Self {
        Self::new(PrState::Unknown, None, None)
    }

    /// Collapse several PRs for one branch: MERGED over OPEN over CLOSED.
    pub fn most_significant(lookups: impl IntoIterator<Item = Self>) -> Self {
        lookups
            .into_iter()
            .max_by_key(|l| l.state.precedence())
            .unwrap_or_else(Self::none)
    }
}
