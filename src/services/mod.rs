pub mod agent_routing;
pub mod backlog_ranker;
pub mod branch_naming;
pub mod capacity_manager;
pub mod conflict_detector;
pub mod phase_machine;
pub mod task_launcher;

pub use agent_routing::{resolve_invocation, AgentInvocation, AgentKind};
pub use backlog_ranker::{BacklogRanker, RankedCandidate};
pub use branch_naming::{sanitize, sanitize_with_limit, BranchName, TaskKind};
pub use capacity_manager::{CapacityDenial, CapacityManager};
pub use conflict_detector::{ConflictDetector, ConflictReason};
pub use phase_machine::{NextAction, PhaseStateMachine};
pub use task_launcher::{LaunchSettings, TaskLauncher};
