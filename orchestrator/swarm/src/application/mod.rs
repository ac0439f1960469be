// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Coordinator use cases on top of the follower registry.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** START/EMERGENCY dispatch

pub mod dispatcher;

pub use dispatcher::{Dispatcher, QUORUM_POLL_INTERVAL};
