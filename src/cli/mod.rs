//! Command-line interface.

pub mod commands;
pub mod output;
pub mod table;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::Config;

#[derive(Parser, Debug)]
#[command(
    name = "mill",
    version,
    about = "Run coding agents in parallel on ranked backlog items",
    long_about = None
)]
pub struct Cli {
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Load this config file instead of .mill/config.yaml
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Admit backlog work and reconcile running tasks until stopped
    Run(commands::run::RunArgs),
    /// Reconcile running tasks without admitting new ones
    Monitor(commands::run::MonitorArgs),
    /// Show the ranked backlog
    Rank(commands::rank::RankArgs),
    /// Show tracked tasks, or one task in detail
    Status(commands::status::StatusArgs),
    /// Show the next step for a task
    Next(commands::next::NextArgs),
    /// Mark a task phase complete
    Complete(commands::complete::CompleteArgs),
    /// Create the phase record for a task
    Init(commands::init::InitArgs),
    /// Ask a running loop to stop after its current cycle
    Stop,
}

/// Resolved configuration plus the project directory every relative path
/// in it is anchored to.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub repo_root: PathBuf,
}

impl AppContext {
    pub fn new(config: Config, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            repo_root: repo_root.into(),
        }
    }

    pub fn stop_marker(&self) -> PathBuf {
        self.repo_root.join(&self.config.monitor.stop_file)
    }
}

/// Print an error chain and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({ "error": format!("{err:#}") });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1)
}
