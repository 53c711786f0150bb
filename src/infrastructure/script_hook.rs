//! Post-completion hook running a configured script.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::domain::errors::HookError;
use crate::domain::models::{HookConfig, Outcome, Task};
use crate::domain::ports::CompletionHook;

pub struct ScriptHook {
    config: HookConfig,
    base_dir: PathBuf,
}

impl ScriptHook {
    /// Relative script paths are resolved against `base_dir`.
    pub fn new(config: HookConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
        }
    }

    fn substitute(value: &str, task: &Task, outcome: Outcome) -> String {
        value
            .replace("{task_id}", &task.id)
            .replace("{outcome}", outcome.as_str())
            .replace("{branch}", &task.branch)
    }

    fn script_path(&self) -> PathBuf {
        let script = PathBuf::from(&self.config.script);
        if script.components().count() > 1 && script.is_relative() {
            self.base_dir.join(script)
        } else {
            script
        }
    }
}

#[async_trait]
impl CompletionHook for ScriptHook {
    fn name(&self) -> &str {
        &self.config.name
    }

    #[instrument(skip(self, task), fields(hook = %self.config.name, task_id = %task.id))]
    async fn run(&self, task: &Task, outcome: Outcome) -> Result<(), HookError> {
        let name = self.config.name.clone();
        let script = self.script_path();
        let args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|arg| Self::substitute(arg, task, outcome))
            .collect();

        debug!(script = %script.display(), args = ?args, "Running hook script");

        let child = Command::new(&script)
            .args(&args)
            .current_dir(&self.base_dir)
            .env("MILL_TASK_ID", &task.id)
            .env("MILL_OUTCOME", outcome.as_str())
            .env("MILL_BRANCH", &task.branch)
            .env("MILL_CANDIDATE_ID", &task.candidate_id)
            .env("MILL_WORKTREE", &task.worktree_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let timeout_secs = self.config.timeout_secs;
        let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(HookError::Spawn {
                    name,
                    reason: format!("{}: {e}", script.display()),
                })
            }
            Err(_) => return Err(HookError::Timeout { name, timeout_secs }),
        };

        if !output.status.success() {
            return Err(HookError::NonZeroExit {
                name,
                status: output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(output = %stdout.trim(), "Hook output");
        }
        info!("Hook completed");
        Ok(())
    }
}
