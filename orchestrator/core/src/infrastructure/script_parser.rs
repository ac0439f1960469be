// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Choreography Script Parser
//!
//! Turns a per-drone text script into compiled [`DanceScript`]s.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external text → Domain objects
//! - **Anti-Corruption:** Line-level mistakes become [`ParseWarning`]s and
//!   the offending line is dropped; only a missing header is fatal.
//!
//! # Script Format
//!
//! ```text
//! number_of_performances = 1
//! # comment
//! 0     TAKEOFF
//! 2000  POS 0.0 0.0 1.2 0.0
//! PROCEDURE WAVE
//! 0     LEDS ON
//! 300   LEDS OFF
//! ENDP
//! 4000  RUN wave
//! 9000  LAND
//! 9500  END
//! ```
//!
//! Tokens are whitespace-separated and case-insensitive. Each performance
//! ends at `END`. Procedure bodies restart their time base at 0 and the
//! enclosing performance resumes its own timeline after `ENDP`.

use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::script::{
    AltitudeMode, CommandKind, CoordinateSystem, DanceCommand, DanceScript, FlyArguments, Instruction,
    RollPitchMode, ScriptLoadError, Waypoint, YawMode,
};

const HEADER_KEY: &str = "number_of_performances";

/// Largest instruction time accepted, in milliseconds.
pub const MAX_TIME_MS: u64 = i32::MAX as u64;

// ============================================================================
// Diagnostics
// ============================================================================

/// A problem on one line that the parser recovered from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseWarning {
    #[error("line {line}: time {time} is earlier than previous time {previous}")]
    TimeDecreased { line: usize, previous: u64, time: u64 },

    #[error("line {line}: '{token}' is not a time in milliseconds")]
    InvalidTime { line: usize, token: String },

    #[error("line {line}: time {time} exceeds {max} ms")]
    TimeOutOfRange { line: usize, time: u64, max: u64 },

    #[error("line {line}: time without a command")]
    MissingCommand { line: usize },

    #[error("line {line}: ignoring unrecognized command {command}")]
    UnrecognizedCommand { line: usize, command: String },

    #[error("line {line}: ignoring {command}: {reason}")]
    InvalidArguments { line: usize, command: String, reason: String },

    #[error("line {line}: PROCEDURE {name} inside procedure {open} ignored")]
    NestedProcedure { line: usize, name: String, open: String },

    #[error("line {line}: RUN inside procedure {procedure} will be skipped at runtime")]
    NestedRun { line: usize, procedure: String },

    #[error("line {line}: ENDP without PROCEDURE")]
    UnmatchedEndp { line: usize },

    #[error("line {line}: END inside procedure {procedure} closes the procedure")]
    EndInsideProcedure { line: usize, procedure: String },

    #[error("line {line}: procedure {name} redefined")]
    DuplicateProcedure { line: usize, name: String },

    #[error("line {line}: procedure {name} is never closed with ENDP")]
    UnterminatedProcedure { line: usize, name: String },

    #[error("line {line}: RUN of undefined procedure {name}")]
    UnknownProcedure { line: usize, name: String },

    #[error("performance #{performance} has no END")]
    MissingEnd { performance: usize },

    #[error("expected {expected} performances, found {found}")]
    MissingPerformances { expected: usize, found: usize },

    #[error("line {line}: content after the last performance ignored")]
    TrailingContent { line: usize },
}

#[derive(Debug, Default)]
struct Diagnostics(Vec<ParseWarning>);

impl Diagnostics {
    fn push(&mut self, warning: ParseWarning) {
        warn!("{}", warning);
        self.0.push(warning);
    }
}

/// Parser output: the performances plus everything that was skipped.
#[derive(Debug, Clone, Default)]
pub struct ParsedScripts {
    pub performances: Vec<DanceScript>,
    pub warnings: Vec<ParseWarning>,
}

// ============================================================================
// Parser
// ============================================================================

/// Choreography script parser (Infrastructure service)
pub struct ScriptParser;

impl ScriptParser {
    /// Parse a script file from disk
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ParsedScripts, ScriptLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ScriptLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = Self::parse_str(&content)?;
        info!(
            "Loaded {} performance(s) from {} ({} warning(s))",
            parsed.performances.len(),
            path.display(),
            parsed.warnings.len()
        );
        Ok(parsed)
    }

    /// Parse script text
    pub fn parse_str(text: &str) -> Result<ParsedScripts, ScriptLoadError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (_, header) = lines
            .next()
            .ok_or(ScriptLoadError::MissingHeader { found: None })?;
        let expected = parse_header(header).ok_or_else(|| ScriptLoadError::MissingHeader {
            found: Some(header.to_string()),
        })?;
        debug!("Script declares {} performance(s)", expected);

        let mut diagnostics = Diagnostics::default();
        let mut performances = Vec::new();

        for number in 1..=expected {
            let mut builder = PerformanceBuilder::new(number);
            let mut saw_line = false;
            let mut finished = false;
            for (line, text) in lines.by_ref() {
                saw_line = true;
                if builder.feed(line, text, &mut diagnostics) {
                    finished = true;
                    break;
                }
            }
            if !saw_line {
                diagnostics.push(ParseWarning::MissingPerformances {
                    expected,
                    found: performances.len(),
                });
                break;
            }
            if !finished {
                diagnostics.push(ParseWarning::MissingEnd { performance: number });
            }
            performances.push(builder.finish(&mut diagnostics));
        }

        if let Some((line, _)) = lines.next() {
            diagnostics.push(ParseWarning::TrailingContent { line });
        }

        Ok(ParsedScripts {
            performances,
            warnings: diagnostics.0,
        })
    }
}

/// Accepts `number_of_performances = N` with or without spaces around `=`.
fn parse_header(line: &str) -> Option<usize> {
    let (key, value) = line.split_once('=')?;
    if !key.trim().eq_ignore_ascii_case(HEADER_KEY) {
        return None;
    }
    value.trim().parse().ok()
}

// ============================================================================
// Performance blocks
// ============================================================================

struct OpenProcedure {
    name: String,
    line: usize,
    body: DanceScript,
    last_time: u64,
}

struct PerformanceBuilder {
    number: usize,
    main: DanceScript,
    last_time: u64,
    open: Option<OpenProcedure>,
    run_refs: Vec<(usize, String)>,
}

impl PerformanceBuilder {
    fn new(number: usize) -> Self {
        Self {
            number,
            main: DanceScript::new(),
            last_time: 0,
            open: None,
            run_refs: Vec::new(),
        }
    }

    /// Consume one significant line; returns true once the block's `END` is seen.
    fn feed(&mut self, line: usize, text: &str, diagnostics: &mut Diagnostics) -> bool {
        let tokens: Vec<String> = text.split_whitespace().map(|t| t.to_ascii_uppercase()).collect();
        let Some(first) = tokens.first() else {
            return false;
        };

        match first.as_str() {
            "PROCEDURE" => {
                self.open_procedure(line, tokens.get(1), diagnostics);
                false
            }
            "ENDP" => {
                match self.open.take() {
                    Some(procedure) => self.register(procedure, line, diagnostics),
                    None => diagnostics.push(ParseWarning::UnmatchedEndp { line }),
                }
                false
            }
            _ => self.timed_line(line, &tokens, diagnostics),
        }
    }

    fn open_procedure(&mut self, line: usize, name: Option<&String>, diagnostics: &mut Diagnostics) {
        let Some(name) = name else {
            diagnostics.push(ParseWarning::InvalidArguments {
                line,
                command: "PROCEDURE".to_string(),
                reason: "missing procedure name".to_string(),
            });
            return;
        };
        if let Some(open) = &self.open {
            diagnostics.push(ParseWarning::NestedProcedure {
                line,
                name: name.clone(),
                open: open.name.clone(),
            });
            return;
        }
        self.open = Some(OpenProcedure {
            name: name.clone(),
            line,
            body: DanceScript::new(),
            last_time: 0,
        });
    }

    fn register(&mut self, procedure: OpenProcedure, line: usize, diagnostics: &mut Diagnostics) {
        if self.main.procedures.contains_key(&procedure.name) {
            diagnostics.push(ParseWarning::DuplicateProcedure {
                line,
                name: procedure.name.clone(),
            });
        }
        debug!(
            "Procedure {} defined with {} instruction(s)",
            procedure.name,
            procedure.body.len()
        );
        self.main.procedures.insert(procedure.name, procedure.body);
    }

    fn timed_line(&mut self, line: usize, tokens: &[String], diagnostics: &mut Diagnostics) -> bool {
        let time = match tokens[0].parse::<u64>() {
            Ok(time) => time,
            Err(_) => {
                diagnostics.push(ParseWarning::InvalidTime {
                    line,
                    token: tokens[0].clone(),
                });
                return false;
            }
        };
        if time > MAX_TIME_MS {
            diagnostics.push(ParseWarning::TimeOutOfRange {
                line,
                time,
                max: MAX_TIME_MS,
            });
            return false;
        }

        let last_time = match &mut self.open {
            Some(procedure) => &mut procedure.last_time,
            None => &mut self.last_time,
        };
        if time < *last_time {
            diagnostics.push(ParseWarning::TimeDecreased {
                line,
                previous: *last_time,
                time,
            });
        }
        *last_time = time;

        let Some(keyword) = tokens.get(1) else {
            diagnostics.push(ParseWarning::MissingCommand { line });
            return false;
        };
        let Some(kind) = CommandKind::from_keyword(keyword) else {
            diagnostics.push(ParseWarning::UnrecognizedCommand {
                line,
                command: keyword.clone(),
            });
            return false;
        };
        let instruction = match parse_instruction(kind, &tokens[2..]) {
            Ok(instruction) => instruction,
            Err(reason) => {
                diagnostics.push(ParseWarning::InvalidArguments {
                    line,
                    command: kind.to_string(),
                    reason,
                });
                return false;
            }
        };

        if kind == CommandKind::End {
            if let Some(procedure) = self.open.take() {
                diagnostics.push(ParseWarning::EndInsideProcedure {
                    line,
                    procedure: procedure.name.clone(),
                });
                self.register(procedure, line, diagnostics);
                return false;
            }
            self.main.push(DanceCommand::new(time, instruction));
            return true;
        }

        if let Instruction::Run { procedure } = &instruction {
            match &self.open {
                Some(open) => diagnostics.push(ParseWarning::NestedRun {
                    line,
                    procedure: open.name.clone(),
                }),
                None => self.run_refs.push((line, procedure.clone())),
            }
        }

        let command = DanceCommand::new(time, instruction);
        match &mut self.open {
            Some(procedure) => procedure.body.push(command),
            None => self.main.push(command),
        }
        false
    }

    fn finish(mut self, diagnostics: &mut Diagnostics) -> DanceScript {
        if let Some(procedure) = self.open.take() {
            diagnostics.push(ParseWarning::UnterminatedProcedure {
                line: procedure.line,
                name: procedure.name.clone(),
            });
            let line = procedure.line;
            self.register(procedure, line, diagnostics);
        }
        for (line, name) in &self.run_refs {
            if !self.main.procedures.contains_key(name) {
                diagnostics.push(ParseWarning::UnknownProcedure {
                    line: *line,
                    name: name.clone(),
                });
            }
        }
        debug!(
            "Performance #{} parsed: {} instruction(s), {} procedure(s)",
            self.number,
            self.main.len(),
            self.main.procedures.len()
        );
        self.main
    }
}

// ============================================================================
// Arguments
// ============================================================================

fn parse_instruction(kind: CommandKind, args: &[String]) -> Result<Instruction, String> {
    Ok(match kind {
        CommandKind::None => Instruction::None,
        CommandKind::Takeoff => Instruction::Takeoff,
        CommandKind::Land => Instruction::Land,
        CommandKind::Absolute => Instruction::Absolute,
        CommandKind::End => Instruction::End,
        CommandKind::Pos => Instruction::Pos(parse_waypoint(args)?),
        CommandKind::RefPoint => Instruction::RefPoint(parse_waypoint(args)?),
        CommandKind::Relative => Instruction::Relative(parse_waypoint(args)?),
        CommandKind::Fly => Instruction::Fly(parse_fly(args)?),
        CommandKind::HSpeed => Instruction::HSpeed(parse_speed(args)?),
        CommandKind::VSpeed => Instruction::VSpeed(parse_speed(args)?),
        CommandKind::Leds => match args.first().map(String::as_str) {
            Some("ON") => Instruction::Leds { on: true },
            Some("OFF") => Instruction::Leds { on: false },
            Some(other) => return Err(format!("expected ON or OFF, got '{}'", other)),
            None => return Err("expected ON or OFF".to_string()),
        },
        CommandKind::Run => Instruction::Run {
            procedure: args
                .first()
                .cloned()
                .ok_or_else(|| "missing procedure name".to_string())?,
        },
    })
}

fn number(args: &[String], index: usize, expected: usize) -> Result<f64, String> {
    let token = args
        .get(index)
        .ok_or_else(|| format!("expected {} arguments, got {}", expected, args.len()))?;
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("'{}' is not a number", token)),
    }
}

fn parse_waypoint(args: &[String]) -> Result<Waypoint, String> {
    Ok(Waypoint {
        x: number(args, 0, 4)?,
        y: number(args, 1, 4)?,
        z: number(args, 2, 4)?,
        yaw: number(args, 3, 4)?,
    })
}

fn parse_speed(args: &[String]) -> Result<f64, String> {
    let speed = number(args, 0, 1)?;
    if speed < 0.0 {
        return Err(format!("speed limit {} is negative", speed));
    }
    Ok(speed)
}

fn mode(args: &[String], index: usize) -> Result<&str, String> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("expected 8 arguments, got {}", args.len()))
}

fn parse_fly(args: &[String]) -> Result<FlyArguments, String> {
    let altitude_mode = match mode(args, 4)? {
        "ALT_M" => AltitudeMode::Position,
        "ALT_VELO" => AltitudeMode::Velocity,
        other => return Err(format!("unknown altitude mode '{}'", other)),
    };
    let roll_pitch_mode = match mode(args, 5)? {
        "RP_DEG" => RollPitchMode::Angle,
        "RP_VELO" => RollPitchMode::Velocity,
        "RP_POS" => RollPitchMode::Position,
        other => return Err(format!("unknown roll/pitch mode '{}'", other)),
    };
    let yaw_mode = match mode(args, 6)? {
        "Y_DEG" => YawMode::Angle,
        "Y_VELO" => YawMode::AngularVelocity,
        other => return Err(format!("unknown yaw mode '{}'", other)),
    };
    let coordinate_system = match mode(args, 7)? {
        "GROUND" => CoordinateSystem::Ground,
        "BODY" => CoordinateSystem::Body,
        other => return Err(format!("unknown coordinate system '{}'", other)),
    };

    Ok(FlyArguments {
        pitch: number(args, 0, 8)?,
        roll: number(args, 1, 8)?,
        yaw: number(args, 2, 8)?,
        altitude: number(args, 3, 8)?,
        altitude_mode,
        roll_pitch_mode,
        yaw_mode,
        coordinate_system,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(text: &str) -> ParsedScripts {
        ScriptParser::parse_str(text).unwrap()
    }

    #[test]
    fn test_header_variants() {
        for header in [
            "number_of_performances = 1",
            "NUMBER_OF_PERFORMANCES=1",
            "number_of_performances =1",
            "  Number_Of_Performances=   1  ",
        ] {
            let parsed = parse(&format!("{}\n0 END\n", header));
            assert_eq!(parsed.performances.len(), 1, "header {:?}", header);
        }
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let err = ScriptParser::parse_str("# only a comment\n0 TAKEOFF\n").unwrap_err();
        assert!(matches!(err, ScriptLoadError::MissingHeader { found: Some(_) }));

        let err = ScriptParser::parse_str("\n\n").unwrap_err();
        assert!(matches!(err, ScriptLoadError::MissingHeader { found: None }));
    }

    #[test]
    fn test_each_line_becomes_one_instruction() {
        let parsed = parse(
            "number_of_performances = 1\n\
             # warm-up\n\
             \n\
             0 takeoff\n\
             1000   Leds  on\n\
             2000 END\n",
        );
        let script = &parsed.performances[0];
        assert_eq!(script.len(), 3);
        assert_eq!(script.get(0).map(|c| c.kind()), Some(CommandKind::Takeoff));
        assert_eq!(
            script.get(1).map(|c| &c.instruction),
            Some(&Instruction::Leds { on: true })
        );
        assert_eq!(script.times(), vec![0, 1000, 2000]);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_three_line_performance() {
        let parsed = parse(
            "number_of_performances = 1\n\
             0 TAKEOFF\n\
             100 POS 1 2 3 0\n\
             200 END\n",
        );
        assert_eq!(parsed.performances.len(), 1);
        let script = &parsed.performances[0];
        let commands: Vec<(u64, Instruction)> = (0..script.len())
            .filter_map(|i| script.get(i))
            .map(|c| (c.time, c.instruction.clone()))
            .collect();
        assert_eq!(
            commands,
            vec![
                (0, Instruction::Takeoff),
                (100, Instruction::Pos(Waypoint::new(1.0, 2.0, 3.0, 0.0))),
                (200, Instruction::End),
            ]
        );
        assert_eq!(script.landing_time, None);
        assert_eq!(script.times(), vec![0, 100, 200]);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_oversized_header_does_not_preallocate() {
        let parsed = parse(
            "number_of_performances = 18446744073709551615\n\
             0 TAKEOFF\n\
             10 END\n",
        );
        assert_eq!(parsed.performances.len(), 1);
        assert_eq!(
            parsed.warnings,
            vec![ParseWarning::MissingPerformances {
                expected: usize::MAX,
                found: 1
            }]
        );
    }

    #[test]
    fn test_time_beyond_range_is_skipped() {
        let parsed = parse(
            "number_of_performances = 1\n\
             0 TAKEOFF\n\
             9223372036854775000 LAND\n\
             100 END\n",
        );
        let script = &parsed.performances[0];
        assert_eq!(script.times(), vec![0, 100]);
        assert_eq!(script.landing_time, None);
        assert_eq!(
            parsed.warnings,
            vec![ParseWarning::TimeOutOfRange {
                line: 3,
                time: 9_223_372_036_854_775_000,
                max: MAX_TIME_MS
            }]
        );
    }

    #[test]
    fn test_decreasing_time_is_warned_but_kept() {
        let parsed = parse(
            "number_of_performances = 1\n\
             0 TAKEOFF\n\
             500 LEDS ON\n\
             300 LEDS OFF\n\
             1000 END\n",
        );
        assert_eq!(parsed.performances[0].len(), 4);
        assert_eq!(
            parsed.warnings,
            vec![ParseWarning::TimeDecreased { line: 4, previous: 500, time: 300 }]
        );
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let parsed = parse(
            "number_of_performances = 1\n\
             0 JUMP\n\
             10 POS 1.0 2.0\n\
             20 LEDS maybe\n\
             soon TAKEOFF\n\
             30 HSPEED -1\n\
             40 END\n",
        );
        assert_eq!(parsed.performances[0].len(), 1);
        assert_eq!(parsed.warnings.len(), 5);
        assert!(matches!(
            parsed.warnings[0],
            ParseWarning::UnrecognizedCommand { line: 2, .. }
        ));
        assert!(matches!(
            parsed.warnings[3],
            ParseWarning::InvalidTime { line: 5, .. }
        ));
    }

    #[test]
    fn test_procedure_has_own_time_base() {
        let parsed = parse(
            "number_of_performances = 1\n\
             0 LEDS ON\n\
             PROCEDURE blink\n\
             0 LEDS OFF\n\
             200 LEDS ON\n\
             ENDP\n\
             100 RUN blink\n\
             1000 END\n",
        );
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);

        let script = &parsed.performances[0];
        assert_eq!(script.times(), vec![0, 100, 1000]);
        let blink = script.procedure("BLINK").unwrap();
        assert_eq!(blink.times(), vec![0, 200]);
        assert!(blink.procedures.is_empty());
    }

    #[test]
    fn test_fly_modes() {
        let parsed = parse(
            "number_of_performances = 1\n\
             0 FLY 0.5 -0.5 10 1.2 ALT_M RP_VELO Y_DEG GROUND\n\
             10 FLY 0 0 0 0 alt_velo rp_pos y_velo body\n\
             20 FLY 0 0 0 0 ALT_M RP_SIDEWAYS Y_DEG BODY\n\
             30 END\n",
        );
        let script = &parsed.performances[0];
        assert_eq!(script.len(), 3);
        match &script.get(0).unwrap().instruction {
            Instruction::Fly(args) => {
                assert_eq!(args.pitch, 0.5);
                assert_eq!(args.roll, -0.5);
                assert_eq!(args.altitude_mode, AltitudeMode::Position);
                assert_eq!(args.roll_pitch_mode, RollPitchMode::Velocity);
                assert_eq!(args.yaw_mode, YawMode::Angle);
                assert_eq!(args.coordinate_system, CoordinateSystem::Ground);
            }
            other => panic!("expected FLY, got {:?}", other),
        }
        match &script.get(1).unwrap().instruction {
            Instruction::Fly(args) => {
                assert_eq!(args.altitude_mode, AltitudeMode::Velocity);
                assert_eq!(args.roll_pitch_mode, RollPitchMode::Position);
                assert_eq!(args.yaw_mode, YawMode::AngularVelocity);
                assert_eq!(args.coordinate_system, CoordinateSystem::Body);
            }
            other => panic!("expected FLY, got {:?}", other),
        }
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_land_sets_landing_time() {
        let parsed = parse(
            "number_of_performances = 1\n\
             0 TAKEOFF\n\
             8000 LAND\n\
             9000 END\n",
        );
        assert_eq!(parsed.performances[0].landing_time, Some(8000));
    }

    #[test]
    fn test_end_inside_procedure_closes_it() {
        let parsed = parse(
            "number_of_performances = 1\n\
             PROCEDURE wave\n\
             0 LEDS ON\n\
             50 END\n\
             100 RUN wave\n\
             200 END\n",
        );
        let script = &parsed.performances[0];
        assert_eq!(script.times(), vec![100, 200]);
        assert!(script.procedure("wave").is_some());
        assert!(matches!(
            parsed.warnings[0],
            ParseWarning::EndInsideProcedure { line: 4, .. }
        ));
    }

    #[test]
    fn test_multiple_performances_and_shortfall() {
        let parsed = parse(
            "number_of_performances = 3\n\
             0 LEDS ON\n\
             10 END\n\
             0 LEDS OFF\n\
             20 END\n",
        );
        assert_eq!(parsed.performances.len(), 2);
        assert_eq!(parsed.performances[1].duration(), 20);
        assert_eq!(
            parsed.warnings,
            vec![ParseWarning::MissingPerformances { expected: 3, found: 2 }]
        );
    }

    #[test]
    fn test_structural_warnings() {
        let parsed = parse(
            "number_of_performances = 1\n\
             ENDP\n\
             PROCEDURE outer\n\
             PROCEDURE inner\n\
             0 RUN outer\n\
             ENDP\n\
             10 RUN ghost\n\
             20 END\n\
             30 LEDS ON\n",
        );
        assert_eq!(
            parsed.warnings,
            vec![
                ParseWarning::UnmatchedEndp { line: 2 },
                ParseWarning::NestedProcedure {
                    line: 4,
                    name: "INNER".to_string(),
                    open: "OUTER".to_string(),
                },
                ParseWarning::NestedRun { line: 5, procedure: "OUTER".to_string() },
                ParseWarning::UnknownProcedure { line: 7, name: "GHOST".to_string() },
                ParseWarning::TrailingContent { line: 9 },
            ]
        );
    }

    #[test]
    fn test_missing_end_keeps_partial_performance() {
        let parsed = parse("number_of_performances = 1\n0 LEDS ON\n");
        assert_eq!(parsed.performances.len(), 1);
        assert_eq!(parsed.performances[0].len(), 1);
        assert_eq!(parsed.warnings, vec![ParseWarning::MissingEnd { performance: 1 }]);
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "number_of_performances = 1\n0 TAKEOFF\n100 END").unwrap();

        let parsed = ScriptParser::parse_file(file.path()).unwrap();
        assert_eq!(parsed.performances[0].len(), 2);

        let err = ScriptParser::parse_file("/nonexistent/dance_1.txt").unwrap_err();
        assert!(matches!(err, ScriptLoadError::Io { .. }));
    }
}
