// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! TCP connect with an explicit outcome.
//!
//! Both the follower link and the music client give up quietly on a connect
//! timeout, so timing out is a normal [`ConnectOutcome`], not an error.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Connect timeout for the coordinator link and the music server.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug)]
pub enum ConnectOutcome {
    Connected(TcpStream),
    TimedOut,
    Failed(String),
}

pub async fn connect_within(addr: SocketAddr, limit: Duration) -> ConnectOutcome {
    match tokio::time::timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("Failed to set TCP_NODELAY on {}: {}", addr, e);
            }
            ConnectOutcome::Connected(stream)
        }
        Ok(Err(e)) => ConnectOutcome::Failed(e.to_string()),
        Err(_) => ConnectOutcome::TimedOut,
    }
}
