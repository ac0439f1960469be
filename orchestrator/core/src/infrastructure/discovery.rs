// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordinator Discovery
//!
//! How followers learn the coordinator's address:
//!
//! | Mode | Source |
//! |------|--------|
//! | `broadcast` | `MASTER_IP:a.b.c.d` UDP datagrams on the announce port |
//! | `gateway` | default IPv4 route (coordinator hosts the hotspot) |
//! | `static` | `spec.network.coordinator_address` |
//!
//! The coordinator side is [`Announcer`], a background task that broadcasts
//! its address every second until cancelled.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** UDP announce/listen and route-table lookups

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::node_config::{CoordinatorDiscovery, NetworkConfig};

pub const ANNOUNCE_PREFIX: &str = "MASTER_IP:";
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_millis(1000);

/// Announcements are short; anything past this is cut off.
const ANNOUNCE_BUFFER_LEN: usize = 64;

const ROUTE_TABLE: &str = "/proc/net/route";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No default gateway in {0}")]
    NoGateway(String),

    #[error("Static discovery selected but no coordinator_address configured")]
    MissingStaticAddress,
}

pub fn format_announcement(ip: Ipv4Addr) -> String {
    format!("{}{}", ANNOUNCE_PREFIX, ip)
}

/// Extract the address from an announcement; `None` for anything else.
pub fn parse_announcement(message: &str) -> Option<Ipv4Addr> {
    let ip = message.trim_end_matches(['\0', '\n', '\r']).strip_prefix(ANNOUNCE_PREFIX)?;
    ip.trim().parse().ok()
}

/// Best guess at this host's LAN address: the source address the kernel
/// would pick for a broadcast, else for a public route.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let probes = [
        SocketAddrV4::new(Ipv4Addr::BROADCAST, 9),
        SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 80),
    ];
    probes.iter().find_map(|probe| {
        let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.set_broadcast(true).ok()?;
        socket.connect(probe).ok()?;
        match socket.local_addr().ok()? {
            SocketAddr::V4(addr) if !addr.ip().is_unspecified() && !addr.ip().is_loopback() => {
                Some(*addr.ip())
            }
            _ => None,
        }
    })
}

/// Default gateway from the text of `/proc/net/route`.
///
/// Fields are tab-separated; destination `00000000` marks the default
/// route and the gateway is a little-endian hex IPv4 address.
pub fn parse_route_table(table: &str) -> Option<Ipv4Addr> {
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[1] != "00000000" {
            return None;
        }
        let raw = u32::from_str_radix(fields[2], 16).ok()?;
        let gateway = Ipv4Addr::from(raw.to_le_bytes());
        (!gateway.is_unspecified()).then_some(gateway)
    })
}

pub fn gateway_ipv4() -> Result<Ipv4Addr, DiscoveryError> {
    read_gateway(Path::new(ROUTE_TABLE))
}

fn read_gateway(path: &Path) -> Result<Ipv4Addr, DiscoveryError> {
    let table = std::fs::read_to_string(path)?;
    parse_route_table(&table).ok_or_else(|| DiscoveryError::NoGateway(path.display().to_string()))
}

/// UDP socket on the announce port with `SO_REUSEADDR`, so several
/// processes on one host can listen.
pub fn bind_announce_listener(port: u16) -> Result<UdpSocket, DiscoveryError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;
    Ok(UdpSocket::from_std(socket.into())?)
}

/// One receive; a datagram that is not an announcement yields `None`.
pub async fn receive_announcement(socket: &UdpSocket) -> Result<Option<Ipv4Addr>, DiscoveryError> {
    let mut buf = [0u8; ANNOUNCE_BUFFER_LEN];
    let (len, from) = socket.recv_from(&mut buf).await?;
    let message = String::from_utf8_lossy(&buf[..len]);
    match parse_announcement(&message) {
        Some(ip) => {
            info!("Coordinator announced itself at {} (from {})", ip, from);
            Ok(Some(ip))
        }
        None => {
            warn!("Unrecognized announcement from {}: {:?}", from, message);
            Ok(None)
        }
    }
}

/// Receive until a valid announcement arrives.
///
/// Unlike a single [`receive_announcement`], an unrecognized datagram does
/// not end the wait: it is logged and the next datagram is read.
pub async fn wait_for_announcement(socket: &UdpSocket) -> Result<Ipv4Addr, DiscoveryError> {
    loop {
        if let Some(ip) = receive_announcement(socket).await? {
            return Ok(ip);
        }
    }
}

/// Resolve the coordinator address for the configured mode.
///
/// Broadcast mode blocks in [`wait_for_announcement`], so stray traffic on
/// the announce port is skipped rather than ending discovery.
pub async fn resolve_coordinator(network: &NetworkConfig) -> Result<Ipv4Addr, DiscoveryError> {
    match network.coordinator_discovery {
        CoordinatorDiscovery::Static => network
            .coordinator_address
            .ok_or(DiscoveryError::MissingStaticAddress),
        CoordinatorDiscovery::Gateway => {
            let ip = gateway_ipv4()?;
            info!("Using default gateway {} as coordinator", ip);
            Ok(ip)
        }
        CoordinatorDiscovery::Broadcast => {
            let socket = bind_announce_listener(network.announce_port)?;
            info!("Waiting for coordinator announcement on UDP port {}", network.announce_port);
            wait_for_announcement(&socket).await
        }
    }
}

/// Coordinator-side announcement broadcaster (background task)
pub struct Announcer {
    address: Ipv4Addr,
    target: SocketAddrV4,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl Announcer {
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self::with_target(address, SocketAddrV4::new(Ipv4Addr::BROADCAST, port), ANNOUNCE_INTERVAL)
    }

    /// Send to an explicit target instead of the limited broadcast address.
    pub fn with_target(address: Ipv4Addr, target: SocketAddrV4, interval: Duration) -> Self {
        Self {
            address,
            target,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to stop announcing
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Announcer could not bind a UDP socket: {}", e);
                return;
            }
        };
        if let Err(e) = socket.set_broadcast(true) {
            warn!("Announcer could not enable broadcast: {}", e);
        }

        let message = format_announcement(self.address);
        info!(destination = %self.target, "Announcing coordinator as {}", message);

        let mut tick = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match socket.send_to(message.as_bytes(), self.target).await {
                        Ok(_) => debug!("Announcement sent"),
                        Err(e) => warn!("Announcement failed: {}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Stopping coordinator announcements");
                    break;
                }
            }
        }
    }
}
