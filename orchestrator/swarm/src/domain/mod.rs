// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`registry`] | `FollowerRegistry`, `FollowerLink` |

pub mod registry;

pub use registry::*;
