//! tmux execution-context adapter.
//!
//! Each agent runs detached in its own session, named after the task's
//! execution handle.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

use crate::domain::errors::ExecutionError;
use crate::domain::models::ExecutionHandle;
use crate::domain::ports::{ExecutionBackend, ExecutionSpec};
use crate::infrastructure::process;

const GONE_MARKERS: [&str; 3] = ["can't find session", "no server running", "session not found"];

pub struct TmuxSessions {
    base_dir: PathBuf,
}

impl TmuxSessions {
    /// Relative working directories are resolved against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn target(handle: &ExecutionHandle) -> String {
        // `=` forces an exact session-name match
        format!("={}", handle.as_str())
    }

    fn new_session_args(&self, spec: &ExecutionSpec) -> Vec<String> {
        let working_dir = if spec.working_dir.is_absolute() {
            spec.working_dir.clone()
        } else {
            self.base_dir.join(&spec.working_dir)
        };

        let mut args = vec![
            "new-session".to_string(),
            "-d".to_string(),
            "-s".to_string(),
            spec.handle.as_str().to_string(),
            "-c".to_string(),
            working_dir.to_string_lossy().into_owned(),
        ];
        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(spec.program.clone());
        args.extend(spec.args.iter().cloned());
        args
    }
}

#[async_trait]
impl ExecutionBackend for TmuxSessions {
    async fn preflight(&self) -> Result<(), ExecutionError> {
        if process::tool_available("tmux", &["-V"]).await {
            Ok(())
        } else {
            Err(ExecutionError::ToolMissing("tmux".to_string()))
        }
    }

    #[instrument(skip(self, spec), fields(handle = %spec.handle))]
    async fn start(&self, spec: &ExecutionSpec) -> Result<ExecutionHandle, ExecutionError> {
        let fail = |reason: String| ExecutionError::StartFailed {
            handle: spec.handle.to_string(),
            reason,
        };

        let output = process::run("tmux", self.new_session_args(spec), None)
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !output.success {
            return Err(fail(output.stderr));
        }

        info!(program = %spec.program, "Started tmux session");
        Ok(spec.handle.clone())
    }

    async fn is_alive(&self, handle: &ExecutionHandle) -> Result<bool, ExecutionError> {
        let target = Self::target(handle);
        let output = process::run("tmux", ["has-session", "-t", target.as_str()], None)
            .await
            .map_err(|e| ExecutionError::QueryFailed {
                handle: handle.to_string(),
                reason: e.to_string(),
            })?;
        Ok(output.success)
    }

    async fn stop(&self, handle: &ExecutionHandle) -> Result<(), ExecutionError> {
        let fail = |reason: String| ExecutionError::StopFailed {
            handle: handle.to_string(),
            reason,
        };

        let target = Self::target(handle);
        let output = process::run("tmux", ["kill-session", "-t", target.as_str()], None)
            .await
            .map_err(|e| fail(e.to_string()))?;

        if output.success {
            info!(handle = %handle, "Stopped tmux session");
            return Ok(());
        }
        if GONE_MARKERS.iter().any(|m| output.stderr.contains(m)) {
            debug!(handle = %handle, "Session already gone");
            return Ok(());
        }
        Err(fail(output.stderr))
    }
}
