//! Task state persistence port.

use async_trait::async_trait;

use crate::domain::errors::StoreError;
use crate::domain::models::{PhaseState, Task};

/// Durable task state. Every write must be atomic: a concurrent reader sees
/// either the previous record or the new one, never a partial write.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist task metadata (not its phase state).
    async fn save_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Load a task with its phase state filled in.
    async fn load_task(&self, id: &str) -> Result<Option<Task>, StoreError>;

    /// Every persisted task, terminal ones included.
    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;

    async fn save_phase_state(&self, id: &str, state: &PhaseState) -> Result<(), StoreError>;

    async fn load_phase_state(&self, id: &str) -> Result<Option<PhaseState>, StoreError>;

    /// Remove a task's records entirely (launch rollback).
    async fn delete_task(&self, id: &str) -> Result<(), StoreError>;

    /// Persist the ids of all non-terminal tasks.
    async fn save_active_index(&self, ids: &[String]) -> Result<(), StoreError>;

    async fn load_active_index(&self) -> Result<Vec<String>, StoreError>;
}
