// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for a coordinator with real followers
//!
//! Coordinator and followers run in one process over loopback TCP:
//! 1. Followers resolve the coordinator statically and log in
//! 2. The dispatcher waits for quorum and sends START
//! 3. Every node plays its performance to the end
//! 4. An emergency stop reaches followers mid-performance

use flockstep_core::application::performance::{PerformanceOutcome, PerformanceRunner};
use flockstep_core::domain::collaborators::SystemClock;
use flockstep_core::domain::message::FollowerId;
use flockstep_core::domain::node_config::{CoordinatorDiscovery, NetworkConfig};
use flockstep_core::domain::schedule::EmergencyFlag;
use flockstep_core::domain::script::{DanceCommand, DanceScript, Instruction};
use flockstep_core::infrastructure::actuator::{DryRunActuator, SharedPose};
use flockstep_core::infrastructure::transport_client::TransportClient;
use flockstep_swarm::application::dispatcher::Dispatcher;
use flockstep_swarm::domain::registry::FollowerRegistry;
use flockstep_swarm::infrastructure::transport_server::TransportServer;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

fn script(lines: Vec<(u64, Instruction)>) -> DanceScript {
    let mut script = DanceScript::new();
    for (time, instruction) in lines {
        script.push(DanceCommand::new(time, instruction));
    }
    script
}

fn node(drone_id: i32, dance: DanceScript) -> PerformanceRunner {
    PerformanceRunner::new(
        drone_id,
        vec![dance],
        Arc::new(DryRunActuator::new(drone_id)),
        Arc::new(SharedPose::new()),
        Arc::new(SystemClock),
    )
}

async fn start_server() -> (Arc<TransportServer>, FollowerRegistry, u16) {
    let registry = FollowerRegistry::new();
    let server = TransportServer::bind("127.0.0.1:0".parse().unwrap(), registry.clone())
        .await
        .unwrap();
    let port = server.local_addr().unwrap().port();
    let server = Arc::new(server);
    Arc::clone(&server).start();
    (server, registry, port)
}

/// Spawn a follower; returns its performance task and emergency flag.
fn spawn_follower(
    drone_id: i32,
    port: u16,
    dance: DanceScript,
) -> (JoinHandle<PerformanceOutcome>, EmergencyFlag) {
    let runner = node(drone_id, dance);
    let network = NetworkConfig {
        coordinator_discovery: CoordinatorDiscovery::Static,
        coordinator_address: Some(Ipv4Addr::LOCALHOST),
        transport_port: port,
        ..NetworkConfig::default()
    };
    let flag = runner.handle().emergency();
    TransportClient::new(FollowerId(drone_id), network, runner.handle()).start();
    (tokio::spawn(runner.run()), flag)
}

async fn outcome(task: JoinHandle<PerformanceOutcome>) -> PerformanceOutcome {
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("performance did not finish")
        .unwrap()
}

#[tokio::test]
async fn test_swarm_starts_after_quorum() {
    let (server, registry, port) = start_server().await;
    let blink = || script(vec![(0, Instruction::Leds { on: true }), (50, Instruction::End)]);

    let coordinator = node(1, blink());
    let dispatcher = Dispatcher::new(registry.clone(), coordinator.handle(), 3)
        .with_poll_interval(Duration::from_millis(20));
    let local = tokio::spawn(coordinator.run());

    let (first, _) = spawn_follower(2, port, blink());
    let (second, _) = spawn_follower(3, port, blink());

    let sends = tokio::time::timeout(Duration::from_secs(5), dispatcher.send_start_signal_when_ready(0))
        .await
        .unwrap();
    assert_eq!(sends.len(), 2);
    assert_eq!(registry.ids(), vec![FollowerId(2), FollowerId(3)]);

    for task in [local, first, second] {
        assert_eq!(outcome(task).await, PerformanceOutcome::Completed { dance_index: 0 });
    }
    server.shutdown_token().cancel();
}

#[tokio::test]
async fn test_emergency_stop_reaches_followers() {
    let (server, registry, port) = start_server().await;
    let long_show = || {
        script(vec![
            (0, Instruction::Takeoff),
            (30_000, Instruction::Land),
            (30_050, Instruction::End),
        ])
    };

    let coordinator = node(1, long_show());
    let dispatcher = Dispatcher::new(registry.clone(), coordinator.handle(), 2);
    let local = tokio::spawn(coordinator.run());
    let (follower, flag) = spawn_follower(2, port, long_show());

    for send in dispatcher.send_start_signal_when_ready(0).await {
        send.await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    for send in dispatcher.emergency_stop() {
        send.await.unwrap();
    }
    assert_eq!(outcome(local).await, PerformanceOutcome::Completed { dance_index: 0 });

    for _ in 0..100 {
        if flag.is_raised() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(flag.is_raised());
    // Followers keep their own timeline; the flag only suppresses movement.
    assert!(!follower.is_finished());
    follower.abort();
    server.shutdown_token().cancel();
}
