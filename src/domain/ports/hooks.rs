//! Post-completion hook port.

use async_trait::async_trait;

use crate::domain::errors::HookError;
use crate::domain::models::{Outcome, Task};

/// Best-effort action run when a task is retired.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, task: &Task, outcome: Outcome) -> Result<(), HookError>;
}
