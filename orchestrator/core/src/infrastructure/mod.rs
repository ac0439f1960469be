// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod codec;
pub mod net;
pub mod discovery;
pub mod transport_client;
pub mod music;
pub mod script_parser;
pub mod script_source;
pub mod actuator;

pub use transport_client::{SessionEnd, TransportClient, TransportError};
