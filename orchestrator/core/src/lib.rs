// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Flockstep Core
//!
//! Everything a single drone node needs: the wire messages and their codec,
//! coordinator discovery, the follower link, the choreography script parser
//! and the scheduler that plays a script against the flight hardware.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Shared by coordinator and follower nodes

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
