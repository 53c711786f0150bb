//! `mill next`.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;
use crate::domain::ports::TaskStore;
use crate::infrastructure::setup;
use crate::services::NextAction;

#[derive(Args, Debug)]
pub struct NextArgs {
    /// Task id (defaults to the task this shell was launched for)
    #[arg(env = "MILL_TASK_ID")]
    pub task: String,
}

#[derive(Debug, Serialize)]
pub struct NextOutput {
    pub task_id: String,
    pub next: NextAction,
}

impl CommandOutput for NextOutput {
    fn to_human(&self) -> String {
        self.next.to_string()
    }
}

pub async fn execute(args: NextArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let store = setup::task_store(&ctx.config, &ctx.repo_root);
    let task = store
        .load_task(&args.task)
        .await
        .context("Failed to read task state")?
        .with_context(|| format!("Task not found: {}", args.task))?;

    let next = NextAction::for_task(&task, &task.phase_state);
    output(
        &NextOutput {
            task_id: task.id,
            next,
        },
        json_mode,
    );
    Ok(())
}
