// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Transport Client
//!
//! The follower's one session with the coordinator: resolve, connect, send
//! `LOGIN`, then read frames until the coordinator hangs up. Messages are
//! handed to the local [`PerformanceHandle`]; the client never touches
//! schedule state itself.
//!
//! There is no read timeout on this side. A silent coordinator keeps the
//! session open.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Follower-side TCP link

use futures::{SinkExt, StreamExt};
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::application::performance::PerformanceHandle;
use crate::domain::message::{FollowerId, Message};
use crate::domain::node_config::NetworkConfig;
use crate::infrastructure::codec::MessageCodec;
use crate::infrastructure::discovery::{resolve_coordinator, DiscoveryError};
use crate::infrastructure::net::{connect_within, ConnectOutcome, CONNECT_TIMEOUT};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("coordinator discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("failed to connect to {addr}: {reason}")]
    ConnectFailed { addr: SocketAddr, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connect attempt timed out.
    GaveUp,
    /// The coordinator closed the stream.
    Closed,
}

pub struct TransportClient {
    follower_id: FollowerId,
    network: NetworkConfig,
    performance: PerformanceHandle,
    connect_timeout: Duration,
}

impl TransportClient {
    pub fn new(follower_id: FollowerId, network: NetworkConfig, performance: PerformanceHandle) -> Self {
        Self {
            follower_id,
            network,
            performance,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Run the session as a background task.
    pub fn start(self) -> JoinHandle<Result<SessionEnd, TransportError>> {
        tokio::spawn(async move {
            let result = self.run().await;
            if let Err(e) = &result {
                warn!("Coordinator link failed: {}", e);
            }
            result
        })
    }

    pub async fn run(&self) -> Result<SessionEnd, TransportError> {
        let ip = resolve_coordinator(&self.network).await?;
        let addr = SocketAddr::V4(SocketAddrV4::new(ip, self.network.transport_port));
        self.run_session(addr).await
    }

    /// Connect to a known coordinator address and serve the session.
    pub async fn run_session(&self, addr: SocketAddr) -> Result<SessionEnd, TransportError> {
        let stream = match connect_within(addr, self.connect_timeout).await {
            ConnectOutcome::Connected(stream) => stream,
            ConnectOutcome::TimedOut => {
                debug!(%addr, "Coordinator connect timed out; giving up");
                return Ok(SessionEnd::GaveUp);
            }
            ConnectOutcome::Failed(reason) => {
                return Err(TransportError::ConnectFailed { addr, reason });
            }
        };

        let mut framed = Framed::new(stream, MessageCodec::new());
        framed
            .send(Message::Login {
                follower_id: self.follower_id,
            })
            .await?;
        info!(follower_id = %self.follower_id, %addr, "Logged in to coordinator");

        while let Some(message) = framed.next().await {
            match message? {
                Message::Start { dance_index } => {
                    info!(dance_index, "START received");
                    if !self.performance.start(dance_index) {
                        debug!("Performance runner already finished; START dropped");
                    }
                }
                Message::Emergency => {
                    warn!("EMERGENCY received");
                    self.performance.raise_emergency();
                }
                Message::Login { follower_id } => {
                    debug!(%follower_id, "Unexpected LOGIN from coordinator ignored");
                }
            }
        }

        info!("Coordinator closed the connection");
        Ok(SessionEnd::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::performance::{PerformanceOutcome, PerformanceRunner};
    use crate::domain::collaborators::SystemClock;
    use crate::domain::script::{DanceCommand, DanceScript, Instruction};
    use crate::infrastructure::actuator::{DryRunActuator, SharedPose};
    use crate::infrastructure::codec::{encode_frame, read_frame, FrameRead};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn blink() -> DanceScript {
        let mut script = DanceScript::new();
        script.push(DanceCommand::new(0, Instruction::Leds { on: true }));
        script.push(DanceCommand::new(10, Instruction::End));
        script
    }

    #[tokio::test]
    async fn test_session_forwards_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let coordinator = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let login = read_frame(&mut socket, Duration::from_secs(2)).await.unwrap();
            socket.write_all(&[0, 0, 0, 1, 9]).await.unwrap();
            socket
                .write_all(&encode_frame(&Message::Start { dance_index: 1 }))
                .await
                .unwrap();
            socket.write_all(&encode_frame(&Message::Emergency)).await.unwrap();
            login
        });

        let runner = PerformanceRunner::new(
            3,
            vec![blink(), blink()],
            Arc::new(DryRunActuator::new(3)),
            Arc::new(SharedPose::new()),
            Arc::new(SystemClock),
        );
        let client = TransportClient::new(FollowerId(3), NetworkConfig::default(), runner.handle());

        let end = tokio::time::timeout(Duration::from_secs(5), client.run_session(addr))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(end, SessionEnd::Closed);

        let login = coordinator.await.unwrap();
        assert_eq!(login, FrameRead::Frame(vec![1, 0, 0, 0, 3].into()));
        assert!(runner.handle().emergency().is_raised());

        let outcome = tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .unwrap();
        assert_eq!(outcome, PerformanceOutcome::Completed { dance_index: 1 });
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let runner = PerformanceRunner::new(
            3,
            vec![blink()],
            Arc::new(DryRunActuator::new(3)),
            Arc::new(SharedPose::new()),
            Arc::new(SystemClock),
        );
        let client = TransportClient::new(FollowerId(3), NetworkConfig::default(), runner.handle());
        assert!(matches!(
            client.run_session(addr).await,
            Err(TransportError::ConnectFailed { .. })
        ));
    }
}
