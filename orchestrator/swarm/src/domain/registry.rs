// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Follower Registry
//!
//! The coordinator's view of the swarm: one [`FollowerLink`] per follower id
//! that has sent `LOGIN`.
//!
//! - Written by the transport server (login, disconnect).
//! - Read by the dispatcher, which takes a [`FollowerRegistry::snapshot`]
//!   and sends without holding the lock.
//!
//! # Invariants
//!
//! - At most one link per [`FollowerId`]; a second `LOGIN` with the same id
//!   replaces the first.
//! - Closing a connection removes only the links that still point at it.

use futures::SinkExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info};

use flockstep_core::domain::message::{FollowerId, Message};
use flockstep_core::infrastructure::codec::MessageCodec;

/// Opaque id the transport server gives each accepted connection.
pub type ConnectionId = u64;

/// Framed write half of one follower connection.
pub type FollowerSink = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, MessageCodec>;

/// A sink shared by every link registered from the same connection.
pub type SharedSink = Arc<tokio::sync::Mutex<FollowerSink>>;

pub fn shared_sink<W>(writer: W) -> SharedSink
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);
    Arc::new(tokio::sync::Mutex::new(FramedWrite::new(writer, MessageCodec::new())))
}

#[derive(Clone)]
pub struct FollowerLink {
    pub follower_id: FollowerId,
    pub connection_id: ConnectionId,
    pub peer: SocketAddr,
    sink: SharedSink,
}

impl FollowerLink {
    pub fn new(follower_id: FollowerId, connection_id: ConnectionId, peer: SocketAddr, sink: SharedSink) -> Self {
        Self {
            follower_id,
            connection_id,
            peer,
            sink,
        }
    }

    pub async fn send(&self, message: Message) -> io::Result<()> {
        self.sink.lock().await.send(message).await
    }
}

impl std::fmt::Debug for FollowerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowerLink")
            .field("follower_id", &self.follower_id)
            .field("connection_id", &self.connection_id)
            .field("peer", &self.peer)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FollowerRegistry {
    links: Arc<Mutex<HashMap<FollowerId, FollowerLink>>>,
}

impl FollowerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a follower, returning the link it replaced.
    pub fn register(&self, link: FollowerLink) -> Option<FollowerLink> {
        let id = link.follower_id;
        let peer = link.peer;
        let previous = self.links.lock().insert(id, link);
        match &previous {
            Some(old) => info!(follower_id = %id, %peer, old_peer = %old.peer, "Follower re-registered"),
            None => info!(follower_id = %id, %peer, "Follower registered"),
        }
        previous
    }

    /// Drop every link still bound to `connection_id`.
    pub fn remove_connection(&self, connection_id: ConnectionId) -> Vec<FollowerId> {
        let mut links = self.links.lock();
        let gone: Vec<FollowerId> = links
            .values()
            .filter(|link| link.connection_id == connection_id)
            .map(|link| link.follower_id)
            .collect();
        for id in &gone {
            links.remove(id);
            debug!(follower_id = %id, connection_id, "Follower removed");
        }
        gone
    }

    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.lock().is_empty()
    }

    pub fn contains(&self, id: FollowerId) -> bool {
        self.links.lock().contains_key(&id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<FollowerId> {
        let mut ids: Vec<FollowerId> = self.links.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Copy of the current links so callers can send without the lock.
    pub fn snapshot(&self) -> Vec<FollowerLink> {
        self.links.lock().values().cloned().collect()
    }
}
