//! Domain errors for the mill orchestrator.
//!
//! Each component raises its own error type so callers can apply the
//! matching policy: ranking errors are surfaced without retry, launch errors
//! roll back the workspace, phase-order errors leave state untouched, and
//! hook errors are only ever logged.

use thiserror::Error;

use super::models::Phase;

/// The backlog source could not be reached.
#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Backlog source unavailable: {0}")]
    SourceUnavailable(String),
}

impl From<TrackerError> for RankingError {
    fn from(err: TrackerError) -> Self {
        Self::SourceUnavailable(err.to_string())
    }
}

/// Errors from the issue tracker collaborator.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Issue tracker unreachable: {0}")]
    Unreachable(String),

    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    #[error("Malformed backlog data: {0}")]
    Malformed(String),
}

/// Errors from the workspace/VCS collaborator.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to create worktree at {path}: {reason}")]
    CreateFailed { path: String, reason: String },

    #[error("Failed to remove worktree at {path}: {reason}")]
    RemoveFailed { path: String, reason: String },

    #[error("Required tool unavailable: {0}")]
    ToolMissing(String),
}

/// Errors from the execution-context collaborator.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to start execution context {handle}: {reason}")]
    StartFailed { handle: String, reason: String },

    #[error("Failed to query execution context {handle}: {reason}")]
    QueryFailed { handle: String, reason: String },

    #[error("Failed to stop execution context {handle}: {reason}")]
    StopFailed { handle: String, reason: String },

    #[error("Required tool unavailable: {0}")]
    ToolMissing(String),
}

/// Errors from persisted task state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state record {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A launch failed; the partial workspace has been rolled back.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Workspace creation failed: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Execution context start failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Could not persist launched task: {0}")]
    Persistence(#[from] StoreError),

    #[error("Task {0} is already tracked")]
    AlreadyTracked(String),

    #[error("No unused branch name left for {0}")]
    NamesExhausted(String),
}

/// A phase was completed before its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot complete {phase}: {blocking} is not complete")]
pub struct PhaseOrderError {
    pub phase: Phase,
    pub blocking: Phase,
}

/// Errors from the phase state machine.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Order(#[from] PhaseOrderError),

    #[error("Phase state for task {0} not found")]
    NotInitialized(String),

    #[error("Phase state for task {0} already exists")]
    AlreadyInitialized(String),

    #[error("Could not persist phase state: {0}")]
    Persistence(#[from] StoreError),
}

/// A post-completion hook failed. Logged, never propagated past the
/// completion handler.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Hook {name} failed to run: {reason}")]
    Spawn { name: String, reason: String },

    #[error("Hook {name} exited with status {status}: {stderr}")]
    NonZeroExit {
        name: String,
        status: String,
        stderr: String,
    },

    #[error("Hook {name} timed out after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },
}
