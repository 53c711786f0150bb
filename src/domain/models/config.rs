use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::conflict_key::RiskTier;
use super::phase::CheckCommands;

/// Main configuration structure for mill.
///
/// Resolved once at startup and passed explicitly to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Backlog project key (empty = every project)
    #[serde(default)]
    pub project: String,

    /// Maximum number of concurrently active tasks
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Per-risk-tier concurrency ceilings
    #[serde(default)]
    pub risk_limits: RiskLimits,

    /// Backlog ranking weights
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Monitor loop configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Branch and worktree configuration
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Agent execution configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Check commands snapshotted into every new task
    #[serde(default)]
    pub checks: CheckCommands,

    /// Post-completion hooks
    #[serde(default)]
    pub hooks: Vec<HookConfig>,

    /// Directory holding persisted task state
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Exported backlog consumed by the file-backed issue tracker
    #[serde(default = "default_backlog_file")]
    pub backlog_file: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_max_parallel() -> usize {
    3
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".mill/state")
}

fn default_backlog_file() -> PathBuf {
    PathBuf::from(".mill/backlog.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: String::new(),
            max_parallel: default_max_parallel(),
            risk_limits: RiskLimits::default(),
            ranking: RankingConfig::default(),
            monitor: MonitorConfig::default(),
            workspace: WorkspaceConfig::default(),
            agent: AgentConfig::default(),
            checks: CheckCommands::default(),
            hooks: vec![],
            state_dir: default_state_dir(),
            backlog_file: default_backlog_file(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Concurrency ceiling for a risk tier, never above `max_parallel`.
    pub fn limit_for(&self, tier: RiskTier) -> usize {
        let limit = match tier {
            RiskTier::Low => self.risk_limits.low,
            RiskTier::Medium => self.risk_limits.medium,
            RiskTier::High => self.risk_limits.high,
        };
        limit.map_or(self.max_parallel, |l| l.min(self.max_parallel))
    }
}

/// Per-risk-tier limits. `None` means bounded only by `max_parallel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskLimits {
    #[serde(default)]
    pub low: Option<usize>,
    #[serde(default = "default_medium_limit")]
    pub medium: Option<usize>,
    #[serde(default = "default_high_limit")]
    pub high: Option<usize>,
}

#[allow(clippy::unnecessary_wraps)]
const fn default_medium_limit() -> Option<usize> {
    Some(2)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_high_limit() -> Option<usize> {
    Some(1)
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            low: None,
            medium: default_medium_limit(),
            high: default_high_limit(),
        }
    }
}

/// Weights and filters for backlog ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RankingConfig {
    #[serde(default = "default_priority_weight")]
    pub priority_weight: f64,
    #[serde(default = "default_estimate_weight")]
    pub estimate_weight: f64,
    #[serde(default = "default_dependency_weight")]
    pub dependency_weight: f64,
    #[serde(default = "default_age_weight")]
    pub age_weight: f64,
    /// Readiness score of a candidate with unresolved blockers is `-dependency_penalty`
    #[serde(default = "default_dependency_penalty")]
    pub dependency_penalty: f64,
    /// Age at which the starvation bonus saturates
    #[serde(default = "default_age_horizon_days")]
    pub age_horizon_days: f64,
    /// Estimate assumed for unestimated candidates
    #[serde(default = "default_estimate")]
    pub default_estimate: f64,
    /// Tracker states considered actionable
    #[serde(default = "default_actionable_states")]
    pub actionable_states: Vec<String>,
    /// Rank items that have a parent epic
    #[serde(default)]
    pub include_sub_issues: bool,
}

const fn default_priority_weight() -> f64 {
    0.4
}

const fn default_estimate_weight() -> f64 {
    0.2
}

const fn default_dependency_weight() -> f64 {
    0.3
}

const fn default_age_weight() -> f64 {
    0.1
}

const fn default_dependency_penalty() -> f64 {
    1.0
}

const fn default_age_horizon_days() -> f64 {
    30.0
}

const fn default_estimate() -> f64 {
    3.0
}

fn default_actionable_states() -> Vec<String> {
    vec!["Backlog".to_string()]
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            priority_weight: default_priority_weight(),
            estimate_weight: default_estimate_weight(),
            dependency_weight: default_dependency_weight(),
            age_weight: default_age_weight(),
            dependency_penalty: default_dependency_penalty(),
            age_horizon_days: default_age_horizon_days(),
            default_estimate: default_estimate(),
            actionable_states: default_actionable_states(),
            include_sub_issues: false,
        }
    }
}

/// Monitor loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    /// Seconds between reconciliation cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds an execution context may be dead before the task is stalled
    #[serde(default = "default_stall_grace_secs")]
    pub stall_grace_secs: u64,

    /// Upper bound on any single external query
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Marker file requesting a stop after the current cycle
    #[serde(default = "default_stop_file")]
    pub stop_file: PathBuf,
}

const fn default_poll_interval_secs() -> u64 {
    30
}

const fn default_stall_grace_secs() -> u64 {
    120
}

const fn default_query_timeout_secs() -> u64 {
    20
}

fn default_stop_file() -> PathBuf {
    PathBuf::from(".mill/stop")
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            stall_grace_secs: default_stall_grace_secs(),
            query_timeout_secs: default_query_timeout_secs(),
            stop_file: default_stop_file(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stall_grace(&self) -> Duration {
        Duration::from_secs(self.stall_grace_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Branch and worktree configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceConfig {
    /// Branch new worktrees are created from
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Directory holding one worktree per task
    #[serde(default = "default_worktree_root")]
    pub worktree_root: PathBuf,

    /// Fixed branch prefix; derived from the task kind when unset
    #[serde(default)]
    pub branch_prefix: Option<String>,

    /// Ceiling on the full `prefix/slug` branch name
    #[serde(default = "default_max_branch_len")]
    pub max_branch_len: usize,
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_worktree_root() -> PathBuf {
    PathBuf::from(".mill/worktrees")
}

const fn default_max_branch_len() -> usize {
    58
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_branch: default_base_branch(),
            worktree_root: default_worktree_root(),
            branch_prefix: None,
            max_branch_len: default_max_branch_len(),
        }
    }
}

/// Agent execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Model the agent runs with; also selects the agent CLI
    #[serde(default = "default_model")]
    pub model: String,

    /// Explicit agent program, overriding model-based resolution
    #[serde(default)]
    pub command: Option<String>,

    /// Extra arguments; `{task_id}`, `{branch}` and `{objective}` are substituted
    #[serde(default)]
    pub args: Vec<String>,

    /// Prefix for execution context names
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_session_prefix() -> String {
    "mill".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            command: None,
            args: vec![],
            session_prefix: default_session_prefix(),
        }
    }
}

/// A post-completion hook script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HookConfig {
    pub name: String,
    pub script: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_hook_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_hook_timeout_secs() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Also log to stdout when writing files
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_stdout: true,
            rotation: default_rotation(),
        }
    }
}
