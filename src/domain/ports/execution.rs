//! Execution-context port.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::errors::ExecutionError;
use crate::domain::models::ExecutionHandle;

/// What to run in a new execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSpec {
    /// Name the context is started under; becomes the handle
    pub handle: ExecutionHandle,
    pub working_dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Starts agent runs in isolated contexts and later answers whether they
/// are still alive. The orchestrator never inspects their output.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Check that the tooling is installed. Called once before the loop starts.
    async fn preflight(&self) -> Result<(), ExecutionError>;

    async fn start(&self, spec: &ExecutionSpec) -> Result<ExecutionHandle, ExecutionError>;

    async fn is_alive(&self, handle: &ExecutionHandle) -> Result<bool, ExecutionError>;

    /// Stop the context. Stopping a context that is already gone succeeds.
    async fn stop(&self, handle: &ExecutionHandle) -> Result<(), ExecutionError>;
}
