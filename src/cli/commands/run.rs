//! `mill run` and `mill monitor`.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::{AdmissionReport, CycleReport, Orchestrator, StopSignal};
use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;
use crate::infrastructure::setup;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single reconcile + admit cycle and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Run a single reconcile cycle and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub admitting: bool,
    pub cycles: u64,
    pub active: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<CycleReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admission: Option<AdmissionReport>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();

        if let Some(cycle) = &self.cycle {
            lines.push(format!("Checked {} task(s)", cycle.checked));
            for (id, outcome) in &cycle.retired {
                lines.push(format!("  retired  {id} ({outcome})"));
            }
            for id in &cycle.stalled {
                lines.push(format!("  stalled  {id}"));
            }
            for id in &cycle.revived {
                lines.push(format!("  active   {id}"));
            }
            for id in &cycle.failed {
                lines.push(format!("  failed   {id} (retried next cycle)"));
            }
        } else {
            lines.push(format!("Stopped after {} cycle(s)", self.cycles));
        }

        if let Some(admission) = &self.admission {
            for id in &admission.launched {
                lines.push(format!("  launched {id}"));
            }
            for (id, reason) in &admission.deferred {
                lines.push(format!("  deferred {id}: {reason}"));
            }
            for (id, error) in &admission.failed {
                lines.push(format!("  launch failed {id}: {error}"));
            }
        }

        lines.push(format!("{} task(s) active", self.active.len()));
        lines.join("\n")
    }
}

pub async fn execute(args: RunArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    drive(ctx, true, args.once, json_mode).await
}

pub async fn execute_monitor(args: MonitorArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    drive(ctx, false, args.once, json_mode).await
}

async fn drive(ctx: &AppContext, admitting: bool, once: bool, json_mode: bool) -> Result<()> {
    let collaborators = setup::connect(&ctx.config, &ctx.repo_root).await?;
    let orchestrator = Orchestrator::assemble(&ctx.config, collaborators)
        .await
        .context("Failed to load persisted tasks")?;

    let mut result = RunOutput {
        admitting,
        cycles: 0,
        active: Vec::new(),
        cycle: None,
        admission: None,
    };

    if once {
        result.cycles = 1;
        result.cycle = Some(orchestrator.monitor().run_cycle().await);
        if admitting {
            result.admission = Some(
                orchestrator
                    .admission()
                    .fill()
                    .await
                    .context("Admission failed")?,
            );
        }
    } else {
        let stop = StopSignal::with_marker(ctx.stop_marker());
        // a marker left by a crashed run would stop this one immediately
        stop.clear_marker();

        let interrupt = stop.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping after the current cycle");
                    interrupt.cancel();
                }
                Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
            }
        });

        result.cycles = if admitting {
            orchestrator.run(&stop).await
        } else {
            orchestrator.monitor_only(&stop).await
        };
        stop.clear_marker();
    }

    result.active = orchestrator.registry().lock().await.ids();
    output(&result, json_mode);
    Ok(())
}
