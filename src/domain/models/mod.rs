//! Domain models for the mill orchestrator.

pub mod candidate;
pub mod config;
pub mod conflict_key;
pub mod external;
pub mod phase;
pub mod task;

pub use candidate::{Candidate, PriorityTier};
pub use config::{
    AgentConfig, Config, HookConfig, LoggingConfig, MonitorConfig, RankingConfig, RiskLimits,
    WorkspaceConfig,
};
pub use conflict_key::{ConflictKey, Layer, RiskTier, TestTier};
pub use external::{IssueState, PrLookup, PrState};
pub use phase::{CheckCommands, Phase, PhaseState, PhaseStatus};
pub use task::{ExecutionHandle, Outcome, Task, TaskStatus};
