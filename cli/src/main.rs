// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Playbook CLI
//!
//! The `playbook` binary drives the playbook cortex.
//!
//! ## Commands
//!
//! - `playbook search <QUERY> -n <NS>` - Hybrid retrieval over a playbook
//! - `playbook show -n <NS>` - List bullets with counters and confidence
//! - `playbook run -n <NS> --input tasks.jsonl` - Batch generate / reflect / curate
//! - `playbook serve` - HTTP API
//! - `playbook config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use playbook_cli::commands::{self, ConfigCommand, RunArgs, SearchArgs, ServeArgs, ShowArgs};
use playbook_cortex::domain::config::CortexConfigManifest;

/// Playbook Cortex - self-curating strategy memory for LLM problem solving
#[derive(Parser)]
#[command(name = "playbook")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "PLAYBOOK_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Directory holding one JSON playbook per namespace
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PLAYBOOK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a playbook
    #[command(name = "search")]
    Search(SearchArgs),

    /// Show the bullets of a playbook
    #[command(name = "show")]
    Show(ShowArgs),

    /// Run the feedback loop over a JSONL task file
    #[command(name = "run")]
    Run(RunArgs),

    /// Serve the HTTP API
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging settings may come from the config file; a broken file is reported by the command itself
    let logging = CortexConfigManifest::load_or_default(cli.config.clone())
        .ok()
        .and_then(|c| c.spec.observability)
        .and_then(|o| o.logging);
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let json = logging.map(|l| l.format == "json").unwrap_or(false);
    init_logging(&level, json)?;

    match cli.command {
        Some(Commands::Search(args)) => commands::search::handle_command(args, cli.config, cli.data_dir).await,
        Some(Commands::Show(args)) => commands::show::handle_command(args, cli.config, cli.data_dir).await,
        Some(Commands::Run(args)) => commands::run::handle_command(args, cli.config, cli.data_dir).await,
        Some(Commands::Serve(args)) => commands::serve::handle_command(args, cli.config, cli.data_dir).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
