// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Music server client.
//!
//! The coordinator's music box speaks a line protocol over TCP: `clear`,
//! `add <track>`, `play`, one command per line, no replies. Whatever
//! happens, the request completes so the performance clock can start.

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::domain::collaborators::{MusicOutcome, MusicService};
use crate::domain::node_config::MusicConfig;
use crate::infrastructure::net::{connect_within, ConnectOutcome, CONNECT_TIMEOUT};

#[derive(Debug, Error)]
pub enum MusicError {
    #[error("I/O error talking to music server: {0}")]
    Io(#[from] std::io::Error),
}

pub struct TcpMusicService {
    server: Option<SocketAddr>,
    config: MusicConfig,
    connect_timeout: Duration,
}

impl TcpMusicService {
    pub fn new(config: MusicConfig) -> Self {
        let server = config
            .server()
            .map(|ip| SocketAddr::V4(SocketAddrV4::new(ip, config.port)));
        Self {
            server,
            config,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Point at an explicit address, e.g. a local test listener.
    pub fn with_server(config: MusicConfig, server: SocketAddr) -> Self {
        Self {
            server: Some(server),
            config,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn server_ip(&self) -> Option<Ipv4Addr> {
        match self.server {
            Some(SocketAddr::V4(addr)) => Some(*addr.ip()),
            _ => None,
        }
    }

    async fn send_playlist(&self, mut stream: TcpStream, track: &str) -> Result<(), MusicError> {
        for line in ["clear\n".to_string(), format!("add {}\n", track), "play\n".to_string()] {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
        }
        stream.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl MusicService for TcpMusicService {
    async fn play_track(&self, dance_index: u8) -> MusicOutcome {
        let Some(addr) = self.server else {
            warn!("Skipping playback: music server is '{}'", self.config.server_address);
            return MusicOutcome::Skipped;
        };

        let track = self.config.track_name(dance_index);
        info!("Starting music {} on {}", track, addr);

        match connect_within(addr, self.connect_timeout).await {
            ConnectOutcome::Connected(stream) => match self.send_playlist(stream, &track).await {
                Ok(()) => MusicOutcome::Playing,
                Err(e) => {
                    warn!("Failed to communicate with music server: {}", e);
                    MusicOutcome::Failed(e.to_string())
                }
            },
            ConnectOutcome::TimedOut => {
                info!("Music server connect timed out");
                MusicOutcome::Failed("connect timed out".to_string())
            }
            ConnectOutcome::Failed(reason) => {
                warn!("Failed to connect to music server: {}", reason);
                MusicOutcome::Failed(reason)
            }
        }
    }
}
