// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stand-in flight hardware.
//!
//! [`DryRunActuator`] accepts every command and logs it, which is how a node
//! rehearses a show on the ground. [`SharedPose`] is a pose cell that an
//! external estimator writes and the scheduler reads.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::domain::collaborators::{Actuator, ActuatorError, ControlCommand, Pose, PoseSource};

#[derive(Debug, Clone, Default)]
pub struct DryRunActuator {
    drone_id: i32,
}

impl DryRunActuator {
    pub fn new(drone_id: i32) -> Self {
        Self { drone_id }
    }
}

#[async_trait]
impl Actuator for DryRunActuator {
    async fn takeoff(&self) -> Result<(), ActuatorError> {
        info!(drone_id = self.drone_id, "TAKEOFF");
        Ok(())
    }

    async fn land(&self) -> Result<(), ActuatorError> {
        info!(drone_id = self.drone_id, "LAND");
        Ok(())
    }

    async fn confirm_forced_landing(&self) -> Result<(), ActuatorError> {
        info!(drone_id = self.drone_id, "Forced landing confirmed");
        Ok(())
    }

    async fn set_leds(&self, on: bool) -> Result<(), ActuatorError> {
        info!(drone_id = self.drone_id, on, "LEDS");
        Ok(())
    }

    async fn send_control(&self, command: ControlCommand) -> Result<(), ActuatorError> {
        info!(
            drone_id = self.drone_id,
            roll = command.roll,
            pitch = command.pitch,
            yaw = command.yaw,
            altitude = command.altitude,
            "Virtual stick"
        );
        Ok(())
    }
}

/// Latest pose, written by an estimator and read per tick.
#[derive(Debug, Clone)]
pub struct SharedPose(Arc<RwLock<Pose>>);

impl SharedPose {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(Pose::UNAVAILABLE)))
    }

    pub fn update(&self, pose: Pose) {
        *self.0.write() = pose;
    }
}

impl Default for SharedPose {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseSource for SharedPose {
    fn estimate(&self, _drone_id: i32) -> Pose {
        *self.0.read()
    }
}
