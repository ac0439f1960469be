// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Signal Dispatcher
//!
//! Fans START and EMERGENCY out to every registered follower. Each send is
//! its own task; a slow or broken follower never holds up the others, and
//! failures are only logged.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Quorum gating and coordinator-to-follower broadcast

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use flockstep_core::application::performance::PerformanceHandle;
use flockstep_core::domain::message::Message;

use crate::domain::registry::FollowerRegistry;

/// How often the quorum wait re-checks the registry.
pub const QUORUM_POLL_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Clone)]
pub struct Dispatcher {
    registry: FollowerRegistry,
    performance: PerformanceHandle,
    expected_drones: usize,
    poll_interval: Duration,
}

impl Dispatcher {
    /// `expected_drones` counts the coordinator itself.
    pub fn new(registry: FollowerRegistry, performance: PerformanceHandle, expected_drones: usize) -> Self {
        Self {
            registry,
            performance,
            expected_drones,
            poll_interval: QUORUM_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Followers needed before a start goes out.
    pub fn quorum(&self) -> usize {
        self.expected_drones.saturating_sub(1)
    }

    /// Wait until the quorum has logged in, then start everyone.
    pub async fn send_start_signal_when_ready(&self, dance_index: u8) -> Vec<JoinHandle<()>> {
        let quorum = self.quorum();
        let mut tick = tokio::time::interval(self.poll_interval);
        loop {
            tick.tick().await;
            let registered = self.registry.len();
            if registered >= quorum {
                break;
            }
            debug!(registered, quorum, "Waiting for followers");
        }
        info!(dance_index, followers = ?self.registry.ids(), "Quorum reached; starting");
        self.send_start_signal_now(dance_index)
    }

    /// Start every registered follower and the local performance.
    pub fn send_start_signal_now(&self, dance_index: u8) -> Vec<JoinHandle<()>> {
        let sends = self.fan_out(Message::Start { dance_index });
        if !self.performance.start(dance_index) {
            warn!(dance_index, "Local performance already finished");
        }
        sends
    }

    pub fn send_emergency_signal(&self) -> Vec<JoinHandle<()>> {
        self.fan_out(Message::Emergency)
    }

    /// Local emergency stop plus EMERGENCY to every follower.
    pub fn emergency_stop(&self) -> Vec<JoinHandle<()>> {
        self.performance.emergency_stop();
        self.send_emergency_signal()
    }

    fn fan_out(&self, message: Message) -> Vec<JoinHandle<()>> {
        self.registry
            .snapshot()
            .into_iter()
            .map(|link| {
                tokio::spawn(async move {
                    match link.send(message).await {
                        Ok(()) => {
                            metrics::counter!("flockstep_signals_sent_total").increment(1);
                            debug!(follower_id = %link.follower_id, kind = message.kind_name(), "Signal sent");
                        }
                        Err(e) => {
                            warn!(follower_id = %link.follower_id, peer = %link.peer, "Failed to send {}: {}", message.kind_name(), e);
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::{shared_sink, FollowerLink};
    use flockstep_core::application::performance::PerformanceRunner;
    use flockstep_core::domain::message::FollowerId;
    use flockstep_core::domain::collaborators::SystemClock;
    use flockstep_core::infrastructure::actuator::{DryRunActuator, SharedPose};
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn runner() -> PerformanceRunner {
        PerformanceRunner::new(
            0,
            Vec::new(),
            Arc::new(DryRunActuator::new(0)),
            Arc::new(SharedPose::new()),
            Arc::new(SystemClock),
        )
    }

    fn register(registry: &FollowerRegistry, id: i32, connection_id: u64) -> DuplexStream {
        let (ours, theirs) = tokio::io::duplex(64);
        let peer = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 7000 + id as u16));
        registry.register(FollowerLink::new(FollowerId(id), connection_id, peer, shared_sink(ours)));
        theirs
    }

    #[test]
    fn test_quorum_excludes_coordinator() {
        let runner = runner();
        assert_eq!(Dispatcher::new(FollowerRegistry::new(), runner.handle(), 4).quorum(), 3);
        assert_eq!(Dispatcher::new(FollowerRegistry::new(), runner.handle(), 0).quorum(), 0);
    }

    #[tokio::test]
    async fn test_start_waits_for_distinct_followers() {
        let registry = FollowerRegistry::new();
        let runner = runner();
        let dispatcher = Dispatcher::new(registry.clone(), runner.handle(), 3)
            .with_poll_interval(Duration::from_millis(10));

        let _stale = register(&registry, 1, 0);
        let mut replaced = register(&registry, 1, 1);
        let waiting = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.send_start_signal_when_ready(2).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiting.is_finished());

        let mut second = register(&registry, 2, 2);
        let sends = tokio::time::timeout(Duration::from_secs(2), waiting)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sends.len(), 2);
        for send in sends {
            send.await.unwrap();
        }

        for stream in [&mut replaced, &mut second] {
            let mut frame = [0u8; 6];
            stream.read_exact(&mut frame).await.unwrap();
            assert_eq!(frame, [0, 0, 0, 2, 2, 2]);
        }
    }

    #[tokio::test]
    async fn test_emergency_reaches_every_follower() {
        let registry = FollowerRegistry::new();
        let runner = runner();
        let dispatcher = Dispatcher::new(registry.clone(), runner.handle(), 3);

        let mut streams = vec![register(&registry, 1, 0), register(&registry, 2, 1)];
        for send in dispatcher.emergency_stop() {
            send.await.unwrap();
        }
        assert!(runner.handle().emergency().is_raised());

        for stream in &mut streams {
            let mut frame = [0u8; 5];
            stream.read_exact(&mut frame).await.unwrap();
            assert_eq!(frame, [0, 0, 0, 1, 3]);
        }
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_others() {
        let registry = FollowerRegistry::new();
        let runner = runner();
        let dispatcher = Dispatcher::new(registry.clone(), runner.handle(), 3);

        drop(register(&registry, 1, 0));
        let mut alive = register(&registry, 2, 1);
        for send in dispatcher.send_emergency_signal() {
            send.await.unwrap();
        }

        let mut frame = [0u8; 5];
        alive.read_exact(&mut frame).await.unwrap();
        assert_eq!(frame[4], 3);
    }
}
