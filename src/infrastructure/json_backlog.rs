//! Issue tracker backed by an exported backlog file.
//!
//! The file is either a JSON array of issues or an object with an `issues`
//! array. Each issue deserializes as a [`Candidate`]; unknown fields are
//! preserved when states are written back.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::domain::errors::TrackerError;
use crate::domain::models::{Candidate, IssueState};
use crate::domain::ports::IssueTracker;
use crate::infrastructure::store::file_store::write_atomic;

pub struct JsonBacklog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonBacklog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> Result<Value, TrackerError> {
        let content = tokio::fs::read(&self.path).await.map_err(|e| {
            TrackerError::Unreachable(format!("{}: {e}", self.path.display()))
        })?;
        serde_json::from_slice(&content)
            .map_err(|e| TrackerError::Malformed(format!("{}: {e}", self.path.display())))
    }

    fn issues(document: &Value) -> Result<&Vec<Value>, TrackerError> {
        match document {
            Value::Array(items) => Ok(items),
            Value::Object(map) => match map.get("issues") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(TrackerError::Malformed("expected an `issues` array".to_string())),
            },
            _ => Err(TrackerError::Malformed(
                "expected an array or an object with `issues`".to_string(),
            )),
        }
    }

    fn issues_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
        match document {
            Value::Array(items) => Some(items),
            Value::Object(map) => map.get_mut("issues").and_then(Value::as_array_mut),
            _ => None,
        }
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, TrackerError> {
        let document = self.read_document().await?;
        Self::issues(&document)?
            .iter()
            .map(|issue| {
                serde_json::from_value::<Candidate>(issue.clone())
                    .map_err(|e| TrackerError::Malformed(e.to_string()))
            })
            .collect()
    }
}

/// `HOK-12` belongs to project `HOK`.
fn in_project(id: &str, project: &str) -> bool {
    project.is_empty()
        || id
            .rsplit_once('-')
            .is_some_and(|(key, _)| key.eq_ignore_ascii_case(project))
}

#[async_trait]
impl IssueTracker for JsonBacklog {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn list_backlog(&self, project: &str) -> Result<Vec<Candidate>, TrackerError> {
        let candidates: Vec<Candidate> = self
            .candidates()
            .await?
            .into_iter()
            .filter(|c| in_project(&c.id, project))
            .collect();
        debug!(count = candidates.len(), "Loaded backlog");
        Ok(candidates)
    }

    async fn get_issue_state(&self, id: &str) -> Result<IssueState, TrackerError> {
        self.candidates()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .map(|c| c.state)
            .ok_or_else(|| TrackerError::IssueNotFound(id.to_string()))
    }

    async fn set_issue_state(&self, id: &str, state: IssueState) -> Result<(), TrackerError> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read_document().await?;
        let issue = Self::issues_mut(&mut document)
            .and_then(|issues| {
                issues
                    .iter_mut()
                    .find(|issue| issue.get("id").and_then(Value::as_str) == Some(id))
            })
            .and_then(Value::as_object_mut)
            .ok_or_else(|| TrackerError::IssueNotFound(id.to_string()))?;
        issue.insert("state".to_string(), Value::String(state.to_string()));

        let content = serde_json::to_vec_pretty(&document)
            .map_err(|e| TrackerError::Malformed(e.to_string()))?;
        write_atomic(&self.path, &content)
            .await
            .map_err(|e| TrackerError::Unreachable(e.to_string()))?;

        info!(issue_id = id, state = %state, "Updated issue state");
        Ok(())
    }
}
