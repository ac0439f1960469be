// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Choreography Scripts
//!
//! Compiled form of one performance. A [`DanceScript`] is produced once by
//! [`crate::infrastructure::script_parser::ScriptParser`] and is read-only
//! afterwards; the scheduler shares it behind an `Arc`.
//!
//! Times are millisecond offsets from the moment the script (or procedure)
//! was started. Within one script they are expected to be non-decreasing.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Four-component target or frame origin: metres and radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
}

impl Waypoint {
    pub fn new(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Self { x, y, z, yaw }
    }
}

/// Vertical channel interpretation for `FLY` (`ALT_M` / `ALT_VELO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeMode {
    Position,
    Velocity,
}

/// Roll/pitch channel interpretation for `FLY` (`RP_DEG` / `RP_VELO` / `RP_POS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollPitchMode {
    Angle,
    Velocity,
    Position,
}

/// Yaw channel interpretation for `FLY` (`Y_DEG` / `Y_VELO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YawMode {
    Angle,
    AngularVelocity,
}

/// Frame for roll/pitch values (`GROUND` / `BODY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    Ground,
    Body,
}

/// Literal stick values for `FLY`, forwarded to the actuator unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyArguments {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
    pub altitude: f64,
    pub altitude_mode: AltitudeMode,
    pub roll_pitch_mode: RollPitchMode,
    pub yaw_mode: YawMode,
    pub coordinate_system: CoordinateSystem,
}

/// Command kind tags, one per script keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    None,
    Takeoff,
    Land,
    Fly,
    Pos,
    Leds,
    Run,
    RefPoint,
    Relative,
    Absolute,
    HSpeed,
    VSpeed,
    End,
}

impl CommandKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            CommandKind::None => "NONE",
            CommandKind::Takeoff => "TAKEOFF",
            CommandKind::Land => "LAND",
            CommandKind::Fly => "FLY",
            CommandKind::Pos => "POS",
            CommandKind::Leds => "LEDS",
            CommandKind::Run => "RUN",
            CommandKind::RefPoint => "REFPOINT",
            CommandKind::Relative => "RELATIVE",
            CommandKind::Absolute => "ABSOLUTE",
            CommandKind::HSpeed => "HSPEED",
            CommandKind::VSpeed => "VSPEED",
            CommandKind::End => "END",
        }
    }

    /// Keyword lookup; `keyword` must already be upper-case.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "NONE" => CommandKind::None,
            "TAKEOFF" => CommandKind::Takeoff,
            "LAND" => CommandKind::Land,
            "FLY" => CommandKind::Fly,
            "POS" => CommandKind::Pos,
            "LEDS" => CommandKind::Leds,
            "RUN" => CommandKind::Run,
            "REFPOINT" => CommandKind::RefPoint,
            "RELATIVE" => CommandKind::Relative,
            "ABSOLUTE" => CommandKind::Absolute,
            "HSPEED" => CommandKind::HSpeed,
            "VSPEED" => CommandKind::VSpeed,
            "END" => CommandKind::End,
            _ => return None,
        })
    }

    /// Kinds that keep re-firing every repeat delay until the next instruction is due.
    pub fn is_repeatable(&self) -> bool {
        matches!(self, CommandKind::Pos | CommandKind::Fly)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A command together with its kind-specific arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    None,
    Takeoff,
    Land,
    Fly(FlyArguments),
    Pos(Waypoint),
    Leds { on: bool },
    Run { procedure: String },
    RefPoint(Waypoint),
    Relative(Waypoint),
    Absolute,
    HSpeed(f64),
    VSpeed(f64),
    End,
}

impl Instruction {
    pub fn kind(&self) -> CommandKind {
        match self {
            Instruction::None => CommandKind::None,
            Instruction::Takeoff => CommandKind::Takeoff,
            Instruction::Land => CommandKind::Land,
            Instruction::Fly(_) => CommandKind::Fly,
            Instruction::Pos(_) => CommandKind::Pos,
            Instruction::Leds { .. } => CommandKind::Leds,
            Instruction::Run { .. } => CommandKind::Run,
            Instruction::RefPoint(_) => CommandKind::RefPoint,
            Instruction::Relative(_) => CommandKind::Relative,
            Instruction::Absolute => CommandKind::Absolute,
            Instruction::HSpeed(_) => CommandKind::HSpeed,
            Instruction::VSpeed(_) => CommandKind::VSpeed,
            Instruction::End => CommandKind::End,
        }
    }
}

/// One timed line of a script.
#[derive(Debug, Clone, PartialEq)]
pub struct DanceCommand {
    /// Offset in milliseconds from the start of the enclosing script.
    pub time: u64,
    pub instruction: Instruction,
}

impl DanceCommand {
    pub fn new(time: u64, instruction: Instruction) -> Self {
        Self { time, instruction }
    }

    pub fn kind(&self) -> CommandKind {
        self.instruction.kind()
    }
}

/// A compiled performance, or the body of one procedure.
///
/// # Invariants
///
/// - Procedures live only in the top-level performance; a procedure's own
///   `procedures` map is always empty.
/// - Procedure names are stored upper-case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DanceScript {
    pub instructions: Vec<DanceCommand>,
    pub procedures: HashMap<String, DanceScript>,
    /// Time of the last `LAND` line, if any.
    pub landing_time: Option<u64>,
}

impl DanceScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DanceCommand) {
        if command.kind() == CommandKind::Land {
            self.landing_time = Some(command.time);
        }
        self.instructions.push(command);
    }

    pub fn get(&self, index: usize) -> Option<&DanceCommand> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn procedure(&self, name: &str) -> Option<&DanceScript> {
        self.procedures.get(&name.to_ascii_uppercase())
    }

    /// Time of the final instruction, or 0 for an empty script.
    pub fn duration(&self) -> u64 {
        self.instructions.last().map(|c| c.time).unwrap_or(0)
    }

    pub fn times(&self) -> Vec<u64> {
        self.instructions.iter().map(|c| c.time).collect()
    }
}

/// Failures that leave a drone with no usable choreography.
///
/// Line-level problems are never errors; see
/// [`crate::infrastructure::script_parser::ParseWarning`].
#[derive(Debug, Error)]
pub enum ScriptLoadError {
    #[error("Failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Missing 'number_of_performances = N' header (found {found:?})")]
    MissingHeader { found: Option<String> },
    #[error("No script found for drone {drone_id} in {dir}")]
    NotFound { drone_id: i32, dir: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_records_landing_time() {
        let mut script = DanceScript::new();
        script.push(DanceCommand::new(0, Instruction::Takeoff));
        assert_eq!(script.landing_time, None);

        script.push(DanceCommand::new(9000, Instruction::Land));
        script.push(DanceCommand::new(9500, Instruction::End));
        assert_eq!(script.landing_time, Some(9000));
        assert_eq!(script.duration(), 9500);
    }

    #[test]
    fn test_keywords_round_trip() {
        for kind in [
            CommandKind::None,
            CommandKind::Takeoff,
            CommandKind::Land,
            CommandKind::Fly,
            CommandKind::Pos,
            CommandKind::Leds,
            CommandKind::Run,
            CommandKind::RefPoint,
            CommandKind::Relative,
            CommandKind::Absolute,
            CommandKind::HSpeed,
            CommandKind::VSpeed,
            CommandKind::End,
        ] {
            assert_eq!(CommandKind::from_keyword(kind.keyword()), Some(kind));
        }
        assert_eq!(CommandKind::from_keyword("JUMP"), None);
    }

    #[test]
    fn test_only_pos_and_fly_repeat() {
        assert!(CommandKind::Pos.is_repeatable());
        assert!(CommandKind::Fly.is_repeatable());
        assert!(!CommandKind::Leds.is_repeatable());
        assert!(!CommandKind::Run.is_repeatable());
    }

    #[test]
    fn test_procedure_lookup_is_case_insensitive() {
        let mut script = DanceScript::new();
        script.procedures.insert("BLINK".to_string(), DanceScript::new());
        assert!(script.procedure("blink").is_some());
        assert!(script.procedure("spin").is_none());
    }
}
