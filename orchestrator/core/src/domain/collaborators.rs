// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Collaborator Ports
//!
//! Interfaces the performance runtime drives but does not implement: the
//! flight controller, the pose estimator, the music player, the script
//! store and the wall clock.
//!
//! | Port | Default adapter |
//! |------|-----------------|
//! | [`Actuator`] | [`crate::infrastructure::actuator::DryRunActuator`] |
//! | [`PoseSource`] | [`crate::infrastructure::actuator::SharedPose`] |
//! | [`MusicService`] | [`crate::infrastructure::music::TcpMusicService`] |
//! | [`ScriptSource`] | [`crate::infrastructure::script_source::FileScriptSource`] |
//! | [`Clock`] | [`SystemClock`] |
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Ports (traits) at the edge of the scheduler

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::script::{
    AltitudeMode, CoordinateSystem, DanceScript, FlyArguments, RollPitchMode, ScriptLoadError, YawMode,
};

/// Any x coordinate above this marks the estimate as unavailable.
pub const POSE_UNAVAILABLE_THRESHOLD: f64 = 900.0;

/// Position estimate in metres and radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
}

impl Pose {
    /// What an estimator reports before it has a fix.
    pub const UNAVAILABLE: Pose = Pose { x: 999.0, y: 999.0, z: 999.0, yaw: 0.0 };

    pub fn is_available(&self) -> bool {
        self.x <= POSE_UNAVAILABLE_THRESHOLD
    }
}

/// Virtual-stick command handed to the flight controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCommand {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub altitude: f64,
    pub altitude_mode: AltitudeMode,
    pub roll_pitch_mode: RollPitchMode,
    pub yaw_mode: YawMode,
    pub coordinate_system: CoordinateSystem,
}

impl From<FlyArguments> for ControlCommand {
    fn from(args: FlyArguments) -> Self {
        Self {
            roll: args.roll,
            pitch: args.pitch,
            yaw: args.yaw,
            altitude: args.altitude,
            altitude_mode: args.altitude_mode,
            roll_pitch_mode: args.roll_pitch_mode,
            yaw_mode: args.yaw_mode,
            coordinate_system: args.coordinate_system,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("Flight controller unavailable: {0}")]
    Unavailable(String),
    #[error("Command rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Actuator: Send + Sync {
    async fn takeoff(&self) -> Result<(), ActuatorError>;
    async fn land(&self) -> Result<(), ActuatorError>;
    /// Acknowledge the controller's landing-confirmation prompt.
    async fn confirm_forced_landing(&self) -> Result<(), ActuatorError>;
    async fn set_leds(&self, on: bool) -> Result<(), ActuatorError>;
    async fn send_control(&self, command: ControlCommand) -> Result<(), ActuatorError>;
}

pub trait PoseSource: Send + Sync {
    /// Latest estimate; [`Pose::UNAVAILABLE`] until a fix exists.
    fn estimate(&self, drone_id: i32) -> Pose;
}

/// How a music request ended. The performance clock starts regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicOutcome {
    Playing,
    /// No music server configured.
    Skipped,
    /// The server could not be reached or rejected the commands.
    Failed(String),
}

#[async_trait]
pub trait MusicService: Send + Sync {
    async fn play_track(&self, dance_index: u8) -> MusicOutcome;
}

pub trait ScriptSource: Send + Sync {
    /// All performances for one drone, indexed by dance number.
    fn load_scripts(&self, drone_id: i32) -> Result<Vec<DanceScript>, ScriptLoadError>;
}

/// Wall clock in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
