// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod performance;

// Re-export the runner for convenience
pub use performance::{PerformanceEvent, PerformanceHandle, PerformanceOutcome, PerformanceRunner};
