//! mill - parallel coding-agent orchestrator
//!
//! mill ranks a backlog, launches one agent per admissible item into its
//! own git worktree and tmux session, and reconciles running tasks against
//! pull-request state until each one is merged or closed.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): ranking, conflict and capacity checks,
//!   branch naming, launching, phase ordering
//! - **Application Layer** (`application`): active set, admission, monitor
//!   loop, completion handling
//! - **Infrastructure Layer** (`infrastructure`): config, logging, task
//!   store and the git/tmux/gh/backlog adapters
//! - **CLI Layer** (`cli`): command-line interface

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use application::{Collaborators, Orchestrator, StopSignal};
pub use domain::models::{Candidate, Config, ConflictKey, Outcome, Task, TaskStatus};
pub use infrastructure::config::{ConfigError, ConfigLoader};
