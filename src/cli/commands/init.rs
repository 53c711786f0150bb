//! `mill init`.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;
use crate::domain::models::PhaseState;
use crate::domain::ports::TaskStore;
use crate::infrastructure::setup;
use crate::services::PhaseStateMachine;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Task id (defaults to the task this shell was launched for)
    #[arg(env = "MILL_TASK_ID")]
    pub task: String,

    /// Plan document to record for review
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// Reset an existing phase record
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub task_id: String,
    pub phases: PhaseState,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Initialized phases for {}", self.task_id)];
        if let Some(plan) = &self.phases.plan_path {
            lines.push(format!("Plan: {}", plan.display()));
        }
        let checks = self.phases.checks.configured();
        if !checks.is_empty() {
            lines.push("Checks:".to_string());
            for (name, cmd) in checks {
                lines.push(format!("  {name:<10} {cmd}"));
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    if let Some(plan) = &args.plan {
        if !ctx.repo_root.join(plan).exists() {
            bail!("Plan file not found: {}", plan.display());
        }
    }

    let store = setup::task_store(&ctx.config, &ctx.repo_root);
    // a fresh record snapshots the configured checks; a reset keeps the old ones
    let checks = store
        .load_phase_state(&args.task)
        .await
        .context("Failed to read phase state")?
        .is_none()
        .then(|| ctx.config.checks.clone());

    let machine = PhaseStateMachine::new(store as Arc<dyn TaskStore>);
    let phases = machine
        .initialize(&args.task, checks, args.plan, args.force)
        .await
        .with_context(|| format!("Could not initialize phases for {}", args.task))?;

    output(
        &InitOutput {
            task_id: args.task,
            phases,
        },
        json_mode,
    );
    Ok(())
}
