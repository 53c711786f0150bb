//! `mill status`.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::table::{list_table, render_list};
use crate::cli::AppContext;
use crate::domain::models::{Phase, PhaseStatus, Task};
use crate::domain::ports::TaskStore;
use crate::infrastructure::setup;
use crate::services::NextAction;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Task id; omit to list tasks
    pub task: Option<String>,

    /// Include retired tasks in the list
    #[arg(long, short)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskRow {
    pub id: String,
    pub candidate_id: String,
    pub status: String,
    pub phase: String,
    pub branch: String,
    pub risk: String,
    pub updated_at: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            candidate_id: task.candidate_id.clone(),
            status: task.status.to_string(),
            phase: task
                .phase_state
                .next_pending()
                .map_or_else(|| "done".to_string(), |p| p.to_string()),
            branch: task.branch.clone(),
            risk: task.conflict_key.risk_tier.to_string(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusListOutput {
    pub tasks: Vec<TaskRow>,
    pub total: usize,
}

impl CommandOutput for StatusListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "issue", "status", "phase", "risk", "branch"]);
        for row in &self.tasks {
            table.add_row(vec![
                Cell::new(truncate(&row.id, 40)),
                Cell::new(&row.candidate_id),
                Cell::new(&row.status),
                Cell::new(&row.phase),
                Cell::new(&row.risk),
                Cell::new(truncate(&row.branch, 50)),
            ]);
        }
        render_list("task", &table, self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct StatusDetailOutput {
    pub task: Task,
    pub phases: Vec<(Phase, PhaseStatus)>,
    pub next: NextAction,
}

impl CommandOutput for StatusDetailOutput {
    fn to_human(&self) -> String {
        let task = &self.task;
        let mut lines = vec![
            format!("Task:      {}", task.id),
            format!("Issue:     {} {}", task.candidate_id, task.title),
            format!("Status:    {}", task.status),
            format!("Branch:    {}", task.branch),
            format!("Worktree:  {}", task.worktree_path.display()),
            format!("Session:   {}", task.execution_handle),
            format!("Risk:      {}", task.conflict_key.risk_tier),
        ];
        if let Some(outcome) = task.outcome {
            lines.push(format!("Outcome:   {outcome}"));
        }
        lines.push("Phases:".to_string());
        for (phase, status) in &self.phases {
            lines.push(format!("  {:<10} {}", phase.as_str(), status.as_str()));
        }
        lines.push(format!("Next:      {}", self.next));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        // phase state is stored apart from the task record
        let mut value = serde_json::to_value(self).unwrap_or_default();
        value["task"]["phase_state"] = serde_json::to_value(&self.task.phase_state).unwrap_or_default();
        value
    }
}

pub async fn execute(args: StatusArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let store = setup::task_store(&ctx.config, &ctx.repo_root);

    if let Some(id) = args.task {
        let task = store
            .load_task(&id)
            .await
            .context("Failed to read task state")?
            .with_context(|| format!("Task not found: {id}"))?;
        let phases = Phase::ALL
            .into_iter()
            .map(|p| (p, task.phase_state.status(p)))
            .collect();
        let next = NextAction::for_task(&task, &task.phase_state);
        output(&StatusDetailOutput { task, phases, next }, json_mode);
        return Ok(());
    }

    let tasks: Vec<TaskRow> = store
        .list_tasks()
        .await
        .context("Failed to read task state")?
        .iter()
        .filter(|t| args.all || !t.is_terminal())
        .map(TaskRow::from)
        .collect();
    let total = tasks.len();
    output(&StatusListOutput { tasks, total }, json_mode);
    Ok(())
}
