// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run command
//!
//! Loads the node manifest, applies command-line overrides and hands over
//! to [`crate::node::run_node`].

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use flockstep_core::application::performance::PerformanceOutcome;
use flockstep_core::domain::node_config::{NodeConfigManifest, NodeRole};

use crate::node;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Performance to start once the swarm is ready (coordinator only)
    #[arg(short, long, default_value = "0")]
    pub dance: u8,

    /// Override spec.node.drone_id
    #[arg(long)]
    pub drone_id: Option<i32>,

    /// Override spec.node.role (coordinator | follower)
    #[arg(long)]
    pub role: Option<NodeRole>,

    /// Override spec.swarm.expected_drones
    #[arg(long)]
    pub expected_drones: Option<usize>,

    /// Skip every movement command
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut NodeConfigManifest) {
        if let Some(id) = self.drone_id {
            config.spec.node.drone_id = id;
        }
        if let Some(role) = self.role {
            config.spec.node.role = role;
        }
        if let Some(count) = self.expected_drones {
            config.spec.swarm.expected_drones = count;
        }
        if self.dry_run {
            config.spec.flight.flying_allowed = false;
        }
    }
}

pub async fn handle_command(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let mut config = NodeConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    args.apply(&mut config);
    config
        .validate()
        .context("Configuration validation failed")?;

    println!(
        "{} drone {} as {:?}",
        "Starting".bold(),
        config.spec.node.drone_id,
        config.spec.node.role
    );

    match node::run_node(config, args.dance).await? {
        PerformanceOutcome::Completed { dance_index } => {
            println!("{}", format!("✓ Performance {} completed", dance_index).green());
        }
        PerformanceOutcome::Aborted => {
            println!("{}", "Performance aborted".yellow());
        }
    }

    Ok(())
}
