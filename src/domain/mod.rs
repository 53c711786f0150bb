//! Domain layer for the mill orchestrator
//!
//! Models, collaborator ports and errors. Nothing in here performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    ExecutionError, HookError, LaunchError, PhaseError, PhaseOrderError, RankingError,
    StoreError, TrackerError, WorkspaceError,
};
