//! `mill rank`.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;
use std::collections::HashSet;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::table::{list_table, render_list};
use crate::cli::AppContext;
use crate::domain::models::ConflictKey;
use crate::domain::ports::TaskStore;
use crate::infrastructure::{setup, JsonBacklog};
use crate::services::BacklogRanker;

#[derive(Args, Debug)]
pub struct RankArgs {
    /// Show at most this many candidates
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RankedRow {
    pub id: String,
    pub title: String,
    pub score: f64,
    pub ready: bool,
    pub priority: String,
    pub estimate: Option<f64>,
    pub risk: String,
    /// Already has a non-terminal task
    pub tracked: bool,
}

#[derive(Debug, Serialize)]
pub struct RankOutput {
    pub candidates: Vec<RankedRow>,
    pub total: usize,
}

impl CommandOutput for RankOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["#", "id", "score", "ready", "priority", "risk", "title"]);
        for (i, row) in self.candidates.iter().enumerate() {
            let id = if row.tracked {
                format!("{}*", row.id)
            } else {
                row.id.clone()
            };
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(id),
                Cell::new(format!("{:.3}", row.score)),
                Cell::new(if row.ready { "yes" } else { "blocked" }),
                Cell::new(&row.priority),
                Cell::new(&row.risk),
                Cell::new(truncate(&row.title, 60)),
            ]);
        }
        render_list("candidate", &table, self.total)
    }
}

pub async fn execute(args: RankArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let tracker = JsonBacklog::new(ctx.repo_root.join(&ctx.config.backlog_file));
    let ranker = BacklogRanker::new(ctx.config.ranking.clone());
    let ranked = ranker
        .fetch_and_rank(&tracker, &ctx.config.project)
        .await
        .context("Failed to rank backlog")?;

    let store = setup::task_store(&ctx.config, &ctx.repo_root);
    let tracked: HashSet<String> = store
        .list_tasks()
        .await
        .context("Failed to read task state")?
        .into_iter()
        .filter(|t| !t.is_terminal())
        .map(|t| t.candidate_id)
        .collect();

    let total = ranked.len();
    let candidates = ranked
        .into_iter()
        .take(args.limit.unwrap_or(usize::MAX))
        .map(|entry| {
            let c = entry.candidate;
            RankedRow {
                risk: ConflictKey::from_labels(&c.labels).risk_tier.to_string(),
                tracked: tracked.contains(&c.id),
                priority: c.priority.as_str().to_string(),
                estimate: c.estimate,
                score: entry.score,
                ready: entry.ready,
                id: c.id,
                title: c.title,
            }
        })
        .collect();

    output(&RankOutput { candidates, total }, json_mode);
    Ok(())
}
