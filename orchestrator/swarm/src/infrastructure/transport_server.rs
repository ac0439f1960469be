// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Transport Server
//!
//! The coordinator's TCP listener. One task multiplexes the listener and
//! every follower connection:
//!
//! ```text
//! select! {
//!     accept      -> split, set TCP_NODELAY, add read stream
//!     frame/read  -> LOGIN registers the follower, anything else is ignored
//!     shutdown    -> stop
//! }
//! ```
//!
//! Each read waits for readiness, then reads one frame with a per-read
//! timeout. A timeout abandons that read but keeps the connection; end of
//! stream closes it. No single connection's error stops the loop.
//!
//! A negative or oversized length prefix also closes the connection rather
//! than skipping ahead and reading on: after a bad length there is no frame
//! boundary left to resynchronise on.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Coordinator-side TCP transport

use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio_stream::StreamMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use flockstep_core::domain::message::Message;
use flockstep_core::infrastructure::codec::{decode_or_skip, read_frame, CodecError, FrameRead};
use flockstep_core::infrastructure::transport_client::TransportError;

use crate::domain::registry::{shared_sink, ConnectionId, FollowerLink, FollowerRegistry, SharedSink};

/// Bound on each header or payload read.
pub const READ_TIMEOUT: Duration = Duration::from_millis(1000);

type FrameStream = BoxStream<'static, Result<FrameRead, CodecError>>;

struct Connection {
    peer: SocketAddr,
    sink: SharedSink,
}

pub struct TransportServer {
    listener: TcpListener,
    registry: FollowerRegistry,
    read_timeout: Duration,
    shutdown_token: CancellationToken,
}

impl TransportServer {
    pub async fn bind(addr: SocketAddr, registry: FollowerRegistry) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Transport server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            registry,
            read_timeout: READ_TIMEOUT,
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> FollowerRegistry {
        self.registry.clone()
    }

    /// Get a handle to stop the server
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let mut reads: StreamMap<ConnectionId, FrameStream> = StreamMap::new();
        let mut connections: HashMap<ConnectionId, Connection> = HashMap::new();
        let mut next_id: ConnectionId = 0;

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(%peer, "Failed to set TCP_NODELAY: {}", e);
                        }
                        let (reader, writer) = stream.into_split();
                        let id = next_id;
                        next_id += 1;
                        connections.insert(id, Connection { peer, sink: shared_sink(writer) });
                        reads.insert(id, frames(reader, self.read_timeout));
                        info!(connection_id = id, %peer, "Follower connected");
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
                Some((id, read)) = reads.next() => {
                    let keep = self.handle_read(id, read, &connections);
                    if !keep {
                        reads.remove(&id);
                        self.close(id, &mut connections);
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Transport server shutting down");
                    break;
                }
            }
        }
    }

    /// Returns `false` when the connection should be closed.
    fn handle_read(
        &self,
        id: ConnectionId,
        read: Result<FrameRead, CodecError>,
        connections: &HashMap<ConnectionId, Connection>,
    ) -> bool {
        match read {
            Ok(FrameRead::Frame(payload)) => {
                match decode_or_skip(&payload) {
                    Some(Message::Login { follower_id }) => {
                        if let Some(connection) = connections.get(&id) {
                            let link = FollowerLink::new(
                                follower_id,
                                id,
                                connection.peer,
                                Arc::clone(&connection.sink),
                            );
                            self.registry.register(link);
                            metrics::counter!("flockstep_followers_logged_in_total").increment(1);
                        }
                    }
                    Some(other) => debug!(connection_id = id, kind = other.kind_name(), "Unexpected message from follower ignored"),
                    None => {}
                }
                true
            }
            Ok(FrameRead::TimedOut) => {
                debug!(connection_id = id, "Read timed out; waiting for next readiness");
                true
            }
            Ok(FrameRead::Closed) => false,
            Err(e) => {
                warn!(connection_id = id, "Dropping connection: {}", e);
                false
            }
        }
    }

    fn close(&self, id: ConnectionId, connections: &mut HashMap<ConnectionId, Connection>) {
        let peer = connections.remove(&id).map(|c| c.peer);
        let gone = self.registry.remove_connection(id);
        info!(connection_id = id, peer = ?peer, followers = ?gone, "Connection closed");
    }
}

/// One frame per readiness event, for as long as the stream is polled.
fn frames(reader: OwnedReadHalf, limit: Duration) -> FrameStream {
    stream::unfold(reader, move |mut reader| async move {
        let read = match reader.readable().await {
            Ok(()) => read_frame(&mut reader, limit).await,
            Err(e) => Err(CodecError::Io(e)),
        };
        Some((read, reader))
    })
    .boxed()
}
