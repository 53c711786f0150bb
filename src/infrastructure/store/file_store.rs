//! File-backed task store.
//!
//! Layout under the state directory:
//!
//! ```text
//! active.json              ordered ids of non-terminal tasks
//! tasks/<id>/task.json     task metadata
//! tasks/<id>/phases.json   phase state
//! ```
//!
//! Task metadata and phase state live in separate files so `mill complete`
//! and the orchestrator never overwrite each other's writes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::{PhaseState, Task};
use crate::domain::ports::TaskStore;

const TASKS_DIR: &str = "tasks";
const TASK_FILE: &str = "task.json";
const PHASES_FILE: &str = "phases.json";
const INDEX_FILE: &str = "active.json";

pub struct FileTaskStore {
    root: PathBuf,
}

impl FileTaskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn task_dir(&self, id: &str) -> PathBuf {
        self.root.join(TASKS_DIR).join(id)
    }

    fn task_path(&self, id: &str) -> PathBuf {
        self.task_dir(id).join(TASK_FILE)
    }

    fn phases_path(&self, id: &str) -> PathBuf {
        self.task_dir(id).join(PHASES_FILE)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    async fn write_json<T: Serialize + Sync>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(value)?;
        write_atomic(path, &content).await
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

/// Write to a uniquely named temp file in the target directory, then rename
/// over the target. Readers see the old file or the new one.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).await.map_err(io_err)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.tmp-{}", Uuid::new_v4()));

    fs::write(&tmp_path, content).await.map_err(io_err)?;

    let sync_path = tmp_path.clone();
    match tokio::task::spawn_blocking(move || std::fs::File::open(&sync_path).and_then(|f| f.sync_all()))
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(path = %tmp_path.display(), error = %e, "Failed to sync temp file"),
        Err(e) => warn!(path = %tmp_path.display(), error = %e, "Failed to sync temp file"),
    }

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(io_err(e));
    }

    debug!(path = %path.display(), "Atomic write completed");
    Ok(())
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        self.write_json(&self.task_path(&task.id), task).await
    }

    async fn load_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let Some(mut task) = self.read_json::<Task>(&self.task_path(id)).await? else {
            return Ok(None);
        };
        if let Some(phases) = self.load_phase_state(id).await? {
            task.phase_state = phases;
        }
        Ok(Some(task))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let tasks_dir = self.root.join(TASKS_DIR);
        let mut entries = match fs::read_dir(&tasks_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: tasks_dir.display().to_string(),
                    source,
                })
            }
        };

        let mut tasks = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StoreError::Io {
                        path: tasks_dir.display().to_string(),
                        source,
                    })
                }
            };
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.load_task(&id).await {
                Ok(Some(task)) => tasks.push(task),
                Ok(None) => {}
                Err(e) => warn!(task_id = %id, error = %e, "Skipping unreadable task record"),
            }
        }

        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn save_phase_state(&self, id: &str, state: &PhaseState) -> Result<(), StoreError> {
        self.write_json(&self.phases_path(id), state).await
    }

    async fn load_phase_state(&self, id: &str) -> Result<Option<PhaseState>, StoreError> {
        self.read_json(&self.phases_path(id)).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), StoreError> {
        let dir = self.task_dir(id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: dir.display().to_string(),
                source,
            }),
        }
    }

    async fn save_active_index(&self, ids: &[String]) -> Result<(), StoreError> {
        self.write_json(&self.index_path(), &ids).await
    }

    async fn load_active_index(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_json(&self.index_path()).await?.unwrap_or_default())
    }
}
