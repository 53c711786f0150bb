//! `mill complete`.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;
use crate::domain::models::Phase;
use crate::domain::ports::TaskStore;
use crate::infrastructure::setup;
use crate::services::PhaseStateMachine;

#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Task id (defaults to the task this shell was launched for)
    #[arg(env = "MILL_TASK_ID")]
    pub task: String,

    /// Phase to mark complete: plan, implement or validate
    #[arg(long, short, value_parser = parse_phase)]
    pub phase: Phase,
}

fn parse_phase(value: &str) -> Result<Phase, String> {
    Phase::from_str(value).ok_or_else(|| format!("unknown phase '{value}' (plan, implement, validate)"))
}

#[derive(Debug, Serialize)]
pub struct CompleteOutput {
    pub task_id: String,
    pub completed: Phase,
    pub next: Option<Phase>,
}

impl CommandOutput for CompleteOutput {
    fn to_human(&self) -> String {
        match self.next {
            Some(next) => format!("{}: {} complete, next is {next}", self.task_id, self.completed),
            None => format!("{}: all phases complete", self.task_id),
        }
    }
}

pub async fn execute(args: CompleteArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let store: Arc<dyn TaskStore> = setup::task_store(&ctx.config, &ctx.repo_root);
    let machine = PhaseStateMachine::new(store);

    let next = machine
        .complete_phase_by_id(&args.task, args.phase)
        .await
        .with_context(|| format!("Could not complete {} for {}", args.phase, args.task))?;

    output(
        &CompleteOutput {
            task_id: args.task,
            completed: args.phase,
            next,
        },
        json_mode,
    );
    Ok(())
}
