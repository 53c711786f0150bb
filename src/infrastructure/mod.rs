//! Infrastructure layer module
//!
//! Concrete adapters for the domain ports plus ambient plumbing:
//! - Configuration loading (figment)
//! - Logging (tracing-subscriber)
//! - File-backed task store
//! - git worktrees, tmux sessions, gh pull-request lookup
//! - JSON backlog issue tracker, script hooks

pub mod config;
pub mod gh_cli;
pub mod git_worktrees;
pub mod json_backlog;
pub mod logging;
pub mod process;
pub mod script_hook;
pub mod setup;
pub mod store;
pub mod tmux;

pub use config::{ConfigError, ConfigLoader};
pub use gh_cli::GhCli;
pub use git_worktrees::GitWorktrees;
pub use json_backlog::JsonBacklog;
pub use logging::LoggerImpl;
pub use script_hook::ScriptHook;
pub use store::{FileTaskStore, MemoryTaskStore};
pub use tmux::TmuxSessions;
