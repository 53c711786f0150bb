use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::models::{PhaseState, Task};
use crate::domain::ports::TaskStore;

#[derive(Default)]
struct Records {
    tasks: HashMap<String, Task>,
    phases: HashMap<String, PhaseState>,
    index: Vec<String>,
}

/// Task store kept in process memory. Mirrors the file store's split
/// between task metadata and phase state.
#[derive(Default)]
pub struct MemoryTaskStore {
    records: Mutex<Records>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, Records> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut stored = task.clone();
        stored.phase_state = PhaseState::default();
        self.records().tasks.insert(task.id.clone(), stored);
        Ok(())
    }

    async fn load_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let records = self.records();
        Ok(records.tasks.get(id).map(|task| {
            let mut task = task.clone();
            if let Some(phases) = records.phases.get(id) {
                task.phase_state = phases.clone();
            }
            task
        }))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let ids: Vec<String> = self.records().tasks.keys().cloned().collect();
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.load_task(&id).await? {
                tasks.push(task);
            }
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn save_phase_state(&self, id: &str, state: &PhaseState) -> Result<(), StoreError> {
        self.records().phases.insert(id.to_string(), state.clone());
        Ok(())
    }

    async fn load_phase_state(&self, id: &str) -> Result<Option<PhaseState>, StoreError> {
        Ok(self.records().phases.get(id).cloned())
    }

    async fn delete_task(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records();
        records.tasks.remove(id);
        records.phases.remove(id);
        Ok(())
    }

    async fn save_active_index(&self, ids: &[String]) -> Result<(), StoreError> {
        self.records().index = ids.to_vec();
        Ok(())
    }

    async fn load_active_index(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.records().index.clone())
    }
}
