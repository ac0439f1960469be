// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # flockstep Drone Node CLI
//!
//! The `flockstep` binary runs one node of a drone show.
//!
//! ## Roles
//!
//! - **Coordinator**: listens for followers, announces itself over UDP,
//!   waits for quorum, then starts everyone (and the music).
//! - **Follower**: finds the coordinator, logs in and waits for START.
//!
//! ## Commands
//!
//! - `flockstep run [--dance N]` - Run this node
//! - `flockstep script check <FILE>` - Parse a choreography script
//! - `flockstep config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use flockstep_cli::commands::{self, ConfigCommand, RunArgs, ScriptCommand};

/// flockstep - synchronized drone choreography
#[derive(Parser)]
#[command(name = "flockstep")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "FLOCKSTEP_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "FLOCKSTEP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run this node as coordinator or follower
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Choreography script tools
    #[command(name = "script")]
    Script {
        #[command(subcommand)]
        command: ScriptCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Run { args }) => commands::run::handle_command(args, cli.config).await,
        Some(Commands::Script { command }) => commands::script::handle_command(command).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
