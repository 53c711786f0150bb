//! Port trait definitions (Hexagonal Architecture)
//!
//! Async interfaces for every external collaborator the core consumes:
//! - IssueTracker: backlog listing and issue state
//! - CodeHost: pull-request lookup
//! - WorkspaceManager: worktree + branch lifecycle
//! - ExecutionBackend: agent execution contexts
//! - CompletionHook: post-completion actions
//! - TaskStore: durable task and phase state
//!
//! Adapters live in `infrastructure`; tests provide mocks.

pub mod code_host;
pub mod execution;
pub mod hooks;
pub mod issue_tracker;
pub mod task_store;
pub mod workspace;

pub use code_host::CodeHost;
pub use execution::{ExecutionBackend, ExecutionSpec};
pub use hooks::CompletionHook;
pub use issue_tracker::IssueTracker;
pub use task_store::TaskStore;
pub use workspace::WorkspaceManager;
