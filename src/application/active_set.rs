//! The active set: every non-terminal task the orchestrator owns.
//!
//! Held behind a single `tokio::sync::Mutex` by whoever drives the loop;
//! that lock is the only way to mutate it. Every mutation is persisted
//! (task record first, then the active index) before the in-memory view
//! changes, so a restart rebuilds the same set.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::errors::StoreError;
use crate::domain::models::{RiskTier, Task};
use crate::domain::ports::TaskStore;

pub struct ActiveSet {
    tasks: BTreeMap<String, Task>,
    store: Arc<dyn TaskStore>,
}

impl ActiveSet {
    /// An empty set backed by `store`.
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            tasks: BTreeMap::new(),
            store,
        }
    }

    /// Rebuild the set from persisted state.
    ///
    /// Index entries whose record is missing or already terminal are
    /// dropped, and the cleaned index is written back.
    #[instrument(skip(store))]
    pub async fn load(store: Arc<dyn TaskStore>) -> Result<Self, StoreError> {
        let ids = store.load_active_index().await?;
        let mut tasks = BTreeMap::new();

        for id in &ids {
            match store.load_task(id).await? {
                Some(task) if !task.is_terminal() => {
                    tasks.insert(task.id.clone(), task);
                }
                Some(task) => {
                    warn!(task_id = %id, status = %task.status, "Dropping terminal task from active index");
                }
                None => warn!(task_id = %id, "Dropping unknown task from active index"),
            }
        }

        let set = Self { tasks, store };
        if set.tasks.len() != ids.len() {
            set.store.save_active_index(&set.ids()).await?;
        }

        info!(active = set.tasks.len(), "Loaded active set");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Owned copies of every task, for work done outside the lock.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn contains_candidate(&self, candidate_id: &str) -> bool {
        self.tasks.values().any(|t| t.candidate_id == candidate_id)
    }

    pub fn count_in_tier(&self, tier: RiskTier) -> usize {
        self.tasks
            .values()
            .filter(|t| t.conflict_key.risk_tier == tier)
            .count()
    }

    /// Register a launched task. Its record must already be persisted.
    pub async fn insert(&mut self, task: Task) -> Result<(), StoreError> {
        let mut ids = self.ids();
        if !self.tasks.contains_key(&task.id) {
            ids.push(task.id.clone());
        }
        self.store.save_active_index(&ids).await?;
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Persist and replace a task's metadata.
    pub async fn update(&mut self, task: Task) -> Result<(), StoreError> {
        self.store.save_task(&task).await?;
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Drop a task from the set. The task record itself is kept.
    pub async fn remove(&mut self, id: &str) -> Result<Option<Task>, StoreError> {
        if !self.tasks.contains_key(id) {
            return Ok(None);
        }
        let ids: Vec<String> = self.tasks.keys().filter(|k| *k != id).cloned().collect();
        self.store.save_active_index(&ids).await?;
        Ok(self.tasks.remove(id))
    }
}
