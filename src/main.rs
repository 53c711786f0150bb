//! mill CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use mill::cli::commands;
use mill::cli::{handle_error, AppContext, Cli, Commands};
use mill::infrastructure::{ConfigLoader, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json_mode);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let repo_root = std::env::current_dir().context("Failed to get current directory")?;
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load_from(&repo_root)?,
    };
    let _logger = LoggerImpl::init(&config.logging)?;
    let ctx = AppContext::new(config, repo_root);

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &ctx, cli.json).await,
        Commands::Monitor(args) => commands::run::execute_monitor(args, &ctx, cli.json).await,
        Commands::Rank(args) => commands::rank::execute(args, &ctx, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, &ctx, cli.json).await,
        Commands::Next(args) => commands::next::execute(args, &ctx, cli.json).await,
        Commands::Complete(args) => commands::complete::execute(args, &ctx, cli.json).await,
        Commands::Init(args) => commands::init::execute(args, &ctx, cli.json).await,
        Commands::Stop => commands::stop::execute(&ctx, cli.json).await,
    }
}
