//! `mill stop`.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::StopSignal;
use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;

#[derive(Debug, Serialize)]
pub struct StopOutput {
    pub marker: String,
}

impl CommandOutput for StopOutput {
    fn to_human(&self) -> String {
        format!(
            "Stop requested ({}). The loop exits after its current cycle.",
            self.marker
        )
    }
}

pub async fn execute(ctx: &AppContext, json_mode: bool) -> Result<()> {
    let marker = ctx.stop_marker();
    StopSignal::request(&marker)
        .with_context(|| format!("Failed to write stop marker {}", marker.display()))?;

    output(
        &StopOutput {
            marker: marker.display().to_string(),
        },
        json_mode,
    );
    Ok(())
}
