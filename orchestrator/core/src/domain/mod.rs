// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value types and pure state machines. Nothing in here performs I/O except
//! the YAML helpers on the node manifest.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Messages, scripts, frame state, scheduling, configuration

pub mod message;
pub mod script;
pub mod navigation;
pub mod collaborators;
pub mod schedule;
pub mod node_config;
