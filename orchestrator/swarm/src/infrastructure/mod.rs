// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod transport_server;

pub use transport_server::{TransportServer, READ_TIMEOUT};
