// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use flockstep_core::domain::node_config::{CoordinatorDiscovery, NodeConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./flockstep-config.yaml)
        #[arg(short, long, default_value = "./flockstep-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = NodeConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. FLOCKSTEP_CONFIG_PATH: {}",
            std::env::var("FLOCKSTEP_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./flockstep-config.yaml");
        println!("  4. ~/.flockstep/config.yaml");
        println!("  5. /etc/flockstep/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config).context("Failed to serialize configuration")?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node Identity:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Drone ID: {}", spec.node.drone_id);
    println!("  Role: {:?}", spec.node.role);
    println!();

    println!("{}", "Swarm:".bold());
    println!("  Expected drones: {}", spec.swarm.expected_drones);
    if config.is_coordinator() {
        println!("  Quorum: {} follower(s)", config.quorum());
    }
    println!();

    println!("{}", "Network:".bold());
    println!("  Discovery: {:?}", spec.network.coordinator_discovery);
    if spec.network.coordinator_discovery == CoordinatorDiscovery::Static {
        println!(
            "  Coordinator: {}",
            spec.network
                .coordinator_address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "(missing)".to_string())
        );
    }
    println!("  Transport port: {}", spec.network.transport_port);
    println!("  Announce port: {}", spec.network.announce_port);
    println!();

    println!("{}", "Music:".bold());
    match spec.music.server() {
        Some(ip) => println!("  Server: {}:{}", ip, spec.music.port),
        None => println!("  Server: {}", "(disabled)".dimmed()),
    }
    println!("  Track for dance 0: {}", spec.music.track_name(0));
    println!();

    println!("{}", "Choreography:".bold());
    println!("  Script dir: {}", spec.choreography.script_dir.display());
    println!("  Practice run: {}", spec.choreography.practice_run);
    println!("  Flying allowed: {}", spec.flight.flying_allowed);

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NodeConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    if with_examples {
        std::fs::write(&output, include_str!("../../templates/config-with-examples.yaml"))
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    } else {
        NodeConfigManifest::default()
            .to_yaml_file(&output)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    }

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
