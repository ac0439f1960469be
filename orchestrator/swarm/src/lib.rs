// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `flockstep-swarm` - Coordinator Crate
//!
//! Everything only the coordinator runs: it accepts follower connections,
//! remembers who has logged in, and fans START and EMERGENCY out to them.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `FollowerRegistry`, `FollowerLink` |
//! | [`application`] | Application | `Dispatcher` |
//! | [`infrastructure`] | Infrastructure | `TransportServer` |
//!
//! ## Key Concepts
//!
//! - **Follower**: a node that connected and sent `LOGIN` with its id.
//! - **Quorum**: `expected_drones - 1` followers; the coordinator is the
//!   remaining drone.
//! - **Fan-out**: one send task per follower, unordered, best effort.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::registry;
pub use application::dispatcher;
pub use infrastructure::transport_server;
