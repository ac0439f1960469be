// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Node wiring
//!
//! Builds the runtime for one node from its manifest and supervises it until
//! the performance ends:
//!
//! | Role | Runs |
//! |------|------|
//! | coordinator, `expected_drones <= 1` | performance runner, music |
//! | coordinator | + transport server, announcer, dispatcher |
//! | follower | performance runner, transport client |
//!
//! Ctrl+C stops the show: the first press is an emergency stop (fanned out
//! to followers on the coordinator), the second exits.
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Composition root for coordinator and follower nodes

use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use flockstep_core::application::performance::{PerformanceHandle, PerformanceOutcome, PerformanceRunner};
use flockstep_core::domain::collaborators::{ScriptSource, SystemClock};
use flockstep_core::domain::message::FollowerId;
use flockstep_core::domain::node_config::NodeConfigManifest;
use flockstep_core::infrastructure::actuator::{DryRunActuator, SharedPose};
use flockstep_core::infrastructure::discovery::{local_ipv4, Announcer};
use flockstep_core::infrastructure::music::TcpMusicService;
use flockstep_core::infrastructure::script_source::FileScriptSource;
use flockstep_core::infrastructure::transport_client::TransportClient;
use flockstep_swarm::application::dispatcher::Dispatcher;
use flockstep_swarm::domain::registry::FollowerRegistry;
use flockstep_swarm::infrastructure::transport_server::TransportServer;

/// Where an operator's emergency stop goes.
enum EmergencyPath {
    Local(PerformanceHandle),
    Swarm(Dispatcher),
}

impl EmergencyPath {
    fn trigger(&self) {
        match self {
            EmergencyPath::Local(handle) => handle.emergency_stop(),
            EmergencyPath::Swarm(dispatcher) => {
                // Sends are best effort; nobody waits on them.
                let _ = dispatcher.emergency_stop();
            }
        }
    }
}

/// Load this drone's scripts and build its performance runner.
pub fn build_runner(config: &NodeConfigManifest) -> Result<PerformanceRunner> {
    let drone_id = config.spec.node.drone_id;
    let dances = FileScriptSource::from_config(&config.spec.choreography)
        .load_scripts(drone_id)
        .context("Failed to load choreography")?;
    info!(drone_id, performances = dances.len(), "Choreography loaded");

    let runner = PerformanceRunner::new(
        drone_id,
        dances,
        Arc::new(DryRunActuator::new(drone_id)),
        Arc::new(SharedPose::new()),
        Arc::new(SystemClock),
    )
    .with_flying_allowed(config.spec.flight.flying_allowed);

    if !config.spec.flight.flying_allowed {
        warn!("Flying disabled; movement commands will be skipped");
    }
    Ok(runner)
}

/// Run this node until its performance ends or the operator exits.
pub async fn run_node(config: NodeConfigManifest, dance_index: u8) -> Result<PerformanceOutcome> {
    let runner = build_runner(&config)?;
    let drone_id = config.spec.node.drone_id;
    let mut stops: Vec<CancellationToken> = Vec::new();

    let (performance, emergency) = if config.is_coordinator() {
        if dance_index as usize >= runner.dance_count() {
            anyhow::bail!(
                "Dance {} not in script ({} performance(s) loaded)",
                dance_index,
                runner.dance_count()
            );
        }
        let runner = runner.with_music(Arc::new(TcpMusicService::new(config.spec.music.clone())));
        let handle = runner.handle();
        let performance = tokio::spawn(runner.run());

        if config.runs_solo() {
            info!(dance_index, "No followers expected; starting solo");
            handle.start(dance_index);
            (performance, EmergencyPath::Local(handle))
        } else {
            let dispatcher = start_coordinator(&config, handle, dance_index, &mut stops).await?;
            (performance, EmergencyPath::Swarm(dispatcher))
        }
    } else {
        let handle = runner.handle();
        TransportClient::new(FollowerId(drone_id), config.spec.network.clone(), handle.clone()).start();
        (tokio::spawn(runner.run()), EmergencyPath::Local(handle))
    };

    let outcome = supervise(performance, &emergency).await;
    for stop in stops {
        stop.cancel();
    }
    outcome
}

async fn start_coordinator(
    config: &NodeConfigManifest,
    performance: PerformanceHandle,
    dance_index: u8,
    stops: &mut Vec<CancellationToken>,
) -> Result<Dispatcher> {
    let network = &config.spec.network;
    let bind_ip: IpAddr = network
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind_address '{}'", network.bind_address))?;

    let registry = FollowerRegistry::new();
    let server = TransportServer::bind(SocketAddr::new(bind_ip, network.transport_port), registry.clone())
        .await
        .context("Failed to start transport server")?;
    let server = Arc::new(server);
    stops.push(server.shutdown_token());
    Arc::clone(&server).start();

    let announcing = match network.advertise_address.or_else(local_ipv4) {
        Some(ip) => {
            let announcer = Arc::new(Announcer::new(ip, network.announce_port));
            let token = announcer.shutdown_token();
            announcer.start();
            stops.push(token.clone());
            Some(token)
        }
        None => {
            warn!("No IPv4 address to announce; followers need gateway or static discovery");
            None
        }
    };

    let dispatcher = Dispatcher::new(registry, performance, config.spec.swarm.expected_drones);
    info!(quorum = dispatcher.quorum(), dance_index, "Waiting for followers");

    let starter = dispatcher.clone();
    tokio::spawn(async move {
        starter.send_start_signal_when_ready(dance_index).await;
        if let Some(token) = announcing {
            token.cancel();
        }
    });
    Ok(dispatcher)
}

async fn supervise(
    mut performance: JoinHandle<PerformanceOutcome>,
    emergency: &EmergencyPath,
) -> Result<PerformanceOutcome> {
    let mut stopping = false;
    loop {
        tokio::select! {
            outcome = &mut performance => {
                return outcome.context("Performance task failed");
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                if stopping {
                    warn!("Second Ctrl+C; exiting");
                    performance.abort();
                    return Ok(PerformanceOutcome::Aborted);
                }
                warn!("Ctrl+C: emergency stop (press again to exit)");
                stopping = true;
                emergency.trigger();
            }
        }
    }
}
