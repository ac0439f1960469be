// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Navigation
//!
//! Pure geometry used by `POS`: the relative coordinate frame a script can
//! switch into, the speed limits, and the proportional controller that turns
//! a target and a pose estimate into a velocity command.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Value objects and pure functions, no I/O

use std::f64::consts::{PI, TAU};

use crate::domain::collaborators::{ControlCommand, Pose};
use crate::domain::script::{AltitudeMode, CoordinateSystem, Instruction, RollPitchMode, Waypoint, YawMode};

pub const DEFAULT_HORIZONTAL_SPEED: f64 = 0.3;
pub const DEFAULT_VERTICAL_SPEED: f64 = 1.0;

/// Yaw rate caps in degrees per second, tighter while translating fast.
pub const YAW_RATE_CAP_TRANSLATING: f64 = 30.0;
pub const YAW_RATE_CAP_HOVERING: f64 = 60.0;

/// Coordinate frame state threaded through instruction execution.
///
/// While `relative_on`, `POS` targets are read as offsets from
/// `reference_point` and mapped onto `relative_pos`, rotated by the yaw
/// difference between the two.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameContext {
    pub relative_on: bool,
    pub relative_pos: Waypoint,
    pub reference_point: Waypoint,
}

impl FrameContext {
    /// Apply a frame instruction; anything else leaves the frame unchanged.
    pub fn apply(self, instruction: &Instruction) -> FrameContext {
        match instruction {
            Instruction::RefPoint(point) => FrameContext { reference_point: *point, ..self },
            Instruction::Relative(origin) => FrameContext {
                relative_on: true,
                relative_pos: *origin,
                ..self
            },
            Instruction::Absolute => FrameContext { relative_on: false, ..self },
            _ => self,
        }
    }

    /// Map script coordinates to absolute coordinates.
    pub fn to_absolute(&self, target: &Waypoint) -> Waypoint {
        if !self.relative_on {
            return *target;
        }
        let origin = self.relative_pos;
        let reference = self.reference_point;

        let dx = target.x - reference.x;
        let dy = target.y - reference.y;
        let (sin, cos) = (origin.yaw - reference.yaw).sin_cos();

        Waypoint {
            x: origin.x + dx * cos - dy * sin,
            y: origin.y + dx * sin + dy * cos,
            z: origin.z + (target.z - reference.z),
            yaw: origin.yaw + (target.yaw - reference.yaw),
        }
    }
}

/// Horizontal and vertical speed limits in m/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedLimits {
    pub horizontal: f64,
    pub vertical: f64,
}

impl Default for SpeedLimits {
    fn default() -> Self {
        Self {
            horizontal: DEFAULT_HORIZONTAL_SPEED,
            vertical: DEFAULT_VERTICAL_SPEED,
        }
    }
}

/// Symmetric clamp that never panics on odd limits.
fn clamp_abs(value: f64, limit: f64) -> f64 {
    value.max(-limit).min(limit)
}

/// Wrap an angle difference into (-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Velocity command steering `pose` towards `target` (both absolute).
pub fn position_control(target: &Waypoint, pose: &Pose, limits: SpeedLimits) -> ControlCommand {
    let yaw_error = normalize_angle(pose.yaw - target.yaw).to_degrees();
    let altitude = clamp_abs(target.z - pose.z, limits.vertical);

    let wx = target.x - pose.x;
    let wy = target.y - pose.y;
    let (sin, cos) = (-pose.yaw).sin_cos();
    let pitch = clamp_abs(wy * cos + wx * sin, limits.horizontal);
    let roll = clamp_abs(-wy * sin + wx * cos, limits.horizontal);

    let half = limits.horizontal / 2.0;
    let yaw_cap = if pitch.abs() > half || roll.abs() > half {
        YAW_RATE_CAP_TRANSLATING
    } else {
        YAW_RATE_CAP_HOVERING
    };

    ControlCommand {
        roll,
        pitch,
        yaw: clamp_abs(yaw_error, yaw_cap),
        altitude,
        altitude_mode: AltitudeMode::Velocity,
        roll_pitch_mode: RollPitchMode::Velocity,
        yaw_mode: YawMode::AngularVelocity,
        coordinate_system: CoordinateSystem::Body,
    }
}
