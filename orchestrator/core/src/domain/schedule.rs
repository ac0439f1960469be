// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Performance Schedule
//!
//! The timing state machine behind a running performance. It is pure: every
//! operation takes the current time in epoch milliseconds and returns what
//! should happen next, so the timer loop in
//! [`crate::application::performance`] owns all I/O.
//!
//! Driving it is a two-step cycle:
//!
//! 1. [`Scheduler::how_much_to_wait`] picks the next instruction (or decides
//!    to repeat the current one) and returns the delay before it is due.
//! 2. After sleeping, [`Scheduler::execute`] runs that instruction once and
//!    may return an [`Action`] for the actuator.
//!
//! `POS` and `FLY` re-arm themselves and fire every [`REPEAT_DELAY_MS`] until
//! the following instruction is due. `RUN` enters a procedure with its own
//! time base; returning restores the caller's position and anchor.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Instruction timing, call stack, emergency time shift

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::collaborators::{ControlCommand, Pose};
use crate::domain::navigation::{position_control, FrameContext, SpeedLimits};
use crate::domain::script::{DanceScript, Instruction};

/// Interval between repeats of `POS` / `FLY`.
pub const REPEAT_DELAY_MS: i64 = 100;

/// Poll interval when nothing is pending.
pub const IDLE_DELAY_MS: i64 = 500;

/// Stand-in landing time for scripts without `LAND`; pushes the whole
/// remaining agenda into the past on emergency.
pub const DEFAULT_LANDING_TIME_MS: i64 = 86_400_000;

/// Procedures may not call procedures.
pub const MAX_CALL_DEPTH: usize = 1;

/// Process-wide abort flag, shared between the transport and the scheduler.
#[derive(Debug, Clone, Default)]
pub struct EmergencyFlag(Arc<AtomicBool>);

impl EmergencyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Side effect requested by one executed instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Takeoff,
    Land,
    SetLeds(bool),
    Control(ControlCommand),
    /// `END` reached; land first when airborne.
    Finish { land: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlightState {
    pub has_taken_off: bool,
    pub has_landed: bool,
}

#[derive(Debug, Clone)]
struct CallFrame {
    script: Arc<DanceScript>,
    agenda_index: Option<usize>,
    time_anchor: i64,
}

/// Scheduling state for one performance on one drone.
///
/// # Invariants
///
/// - `agenda_index` is `None` only before the first instruction of the
///   active script has been selected.
/// - `call_stack.len() <= MAX_CALL_DEPTH`.
#[derive(Debug)]
pub struct Scheduler {
    main: Arc<DanceScript>,
    procedures: HashMap<String, Arc<DanceScript>>,
    active: Arc<DanceScript>,
    agenda_index: Option<usize>,
    time_anchor: i64,
    repeats_remaining: u32,
    repeat_delay: i64,
    call_stack: Vec<CallFrame>,
    frame: FrameContext,
    limits: SpeedLimits,
    flight: FlightState,
    completed: bool,
    flying_allowed: bool,
    emergency: EmergencyFlag,
}

impl Scheduler {
    /// Start a performance whose time zero is `now`.
    pub fn new(script: Arc<DanceScript>, now: i64, emergency: EmergencyFlag, flying_allowed: bool) -> Self {
        let procedures = script
            .procedures
            .iter()
            .map(|(name, body)| (name.clone(), Arc::new(body.clone())))
            .collect();
        Self {
            active: Arc::clone(&script),
            main: script,
            procedures,
            agenda_index: None,
            time_anchor: now,
            repeats_remaining: 0,
            repeat_delay: REPEAT_DELAY_MS,
            call_stack: Vec::with_capacity(MAX_CALL_DEPTH),
            frame: FrameContext::default(),
            limits: SpeedLimits::default(),
            flight: FlightState::default(),
            completed: false,
            flying_allowed,
            emergency,
        }
    }

    pub fn agenda_index(&self) -> Option<usize> {
        self.agenda_index
    }

    pub fn time_anchor(&self) -> i64 {
        self.time_anchor
    }

    pub fn repeats_remaining(&self) -> u32 {
        self.repeats_remaining
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn frame(&self) -> FrameContext {
        self.frame
    }

    pub fn limits(&self) -> SpeedLimits {
        self.limits
    }

    pub fn flight(&self) -> FlightState {
        self.flight
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn main_script(&self) -> &DanceScript {
        &self.main
    }

    fn elapsed(&self, now: i64) -> i64 {
        now.saturating_sub(self.time_anchor)
    }

    fn next_index(&self) -> usize {
        self.agenda_index.map_or(0, |i| i + 1)
    }

    fn landing_time(&self) -> i64 {
        self.active
            .landing_time
            .map(time_ms)
            .unwrap_or(DEFAULT_LANDING_TIME_MS)
    }

    /// Select what runs next and return how many milliseconds until it is due.
    pub fn how_much_to_wait(&mut self, now: i64) -> u64 {
        let next_index = self.next_index();
        let mut delay = IDLE_DELAY_MS;
        let mut advance = false;
        let mut at_end = false;

        if self.repeats_remaining > 0 {
            match self.active.get(next_index) {
                Some(next) if self.elapsed(now).saturating_add(self.repeat_delay) >= time_ms(next.time) => {
                    advance = true
                }
                Some(_) => return self.repeat_delay as u64,
                None => {
                    delay = self.repeat_delay;
                    at_end = true;
                }
            }
        } else if next_index < self.active.len() {
            advance = true;
        } else {
            at_end = true;
        }

        if at_end && self.caller_ready(now) {
            self.return_to_caller(now);
            advance = true;
        }

        if advance {
            let index = self.next_index();
            self.agenda_index = Some(index);
            self.repeats_remaining = 1;
            if let Some(next) = self.active.get(index) {
                return time_ms(next.time).saturating_sub(self.elapsed(now)).max(0) as u64;
            }
        }
        delay as u64
    }

    /// Delay until the already-selected instruction is due.
    pub fn pending_delay(&self, now: i64) -> u64 {
        if self.repeats_remaining == 0 {
            return 0;
        }
        self.agenda_index
            .and_then(|i| self.active.get(i))
            .map(|cmd| time_ms(cmd.time).saturating_sub(self.elapsed(now)).max(0) as u64)
            .unwrap_or(0)
    }

    fn caller_ready(&self, now: i64) -> bool {
        let Some(caller) = self.call_stack.last() else {
            return false;
        };
        if self.repeats_remaining == 0 {
            return true;
        }
        // Still repeating: hand back only once the caller's next line is due.
        match caller.script.get(caller.agenda_index.map_or(0, |i| i + 1)) {
            Some(next) => {
                now.saturating_sub(caller.time_anchor).saturating_add(self.repeat_delay)
                    >= time_ms(next.time)
            }
            None => false,
        }
    }

    fn return_to_caller(&mut self, now: i64) {
        let Some(caller) = self.call_stack.pop() else {
            return;
        };
        self.active = caller.script;
        self.agenda_index = caller.agenda_index;
        self.time_anchor = caller.time_anchor;
        if self.emergency.is_raised() {
            self.time_anchor = now.saturating_sub(self.landing_time());
        }
        debug!(agenda_index = ?self.agenda_index, "Returned from procedure");
    }

    /// Run the selected instruction once.
    ///
    /// `pose` is only consulted by `POS`.
    pub fn execute<P>(&mut self, now: i64, pose: P) -> Option<Action>
    where
        P: FnOnce() -> Pose,
    {
        if self.repeats_remaining == 0 {
            return None;
        }
        self.repeats_remaining -= 1;

        let script = Arc::clone(&self.active);
        let command = script.get(self.agenda_index?)?;
        metrics::counter!("flockstep_instructions_executed_total").increment(1);
        debug!(time = command.time, kind = %command.kind(), "Executing instruction");

        if command.kind().is_repeatable() {
            if !self.may_move() {
                return None;
            }
            self.rearm();
        }

        match &command.instruction {
            Instruction::None => None,
            Instruction::Takeoff => {
                if self.emergency.is_raised() {
                    debug!("Emergency raised; TAKEOFF suppressed");
                    None
                } else if !self.flying_allowed {
                    info!("Flying disabled; TAKEOFF skipped");
                    None
                } else {
                    Some(Action::Takeoff)
                }
            }
            Instruction::Land => {
                if self.flying_allowed {
                    Some(Action::Land)
                } else {
                    info!("Flying disabled; LAND skipped");
                    None
                }
            }
            Instruction::Pos(target) => {
                let target = self.frame.to_absolute(target);
                let pose = pose();
                if !pose.is_available() {
                    debug!("Pose unavailable; POS skipped this tick");
                    return None;
                }
                Some(Action::Control(position_control(&target, &pose, self.limits)))
            }
            Instruction::Fly(args) => Some(Action::Control(ControlCommand::from(*args))),
            Instruction::Leds { on } => Some(Action::SetLeds(*on)),
            Instruction::Run { procedure } => {
                self.call(procedure, now);
                None
            }
            Instruction::RefPoint(_) | Instruction::Relative(_) | Instruction::Absolute => {
                self.frame = self.frame.apply(&command.instruction);
                None
            }
            Instruction::HSpeed(speed) => {
                self.limits.horizontal = *speed;
                None
            }
            Instruction::VSpeed(speed) => {
                self.limits.vertical = *speed;
                None
            }
            Instruction::End => {
                self.completed = true;
                Some(Action::Finish {
                    land: self.flight.has_taken_off && !self.flight.has_landed,
                })
            }
        }
    }

    fn may_move(&self) -> bool {
        self.flying_allowed && !self.emergency.is_raised() && self.flight.has_taken_off
    }

    fn rearm(&mut self) {
        self.repeat_delay = REPEAT_DELAY_MS;
        self.repeats_remaining += 1;
    }

    fn call(&mut self, name: &str, now: i64) {
        if self.emergency.is_raised() {
            debug!(procedure = name, "Emergency raised; RUN suppressed");
            return;
        }
        if self.call_stack.len() >= MAX_CALL_DEPTH {
            warn!(procedure = name, "RUN inside a procedure ignored");
            return;
        }
        let Some(body) = self.procedures.get(&name.to_ascii_uppercase()).cloned() else {
            warn!(procedure = name, "RUN of unknown procedure ignored");
            return;
        };

        let caller = std::mem::replace(&mut self.active, body);
        self.call_stack.push(CallFrame {
            script: caller,
            agenda_index: self.agenda_index,
            time_anchor: self.time_anchor,
        });
        self.agenda_index = None;
        self.time_anchor = now;
        debug!(procedure = name, "Entered procedure");
    }

    pub fn on_takeoff_finished(&mut self, succeeded: bool) {
        if succeeded {
            self.flight.has_taken_off = true;
        }
    }

    pub fn on_land_finished(&mut self, succeeded: bool) {
        if succeeded {
            self.flight.has_landed = true;
            self.flight.has_taken_off = false;
        }
    }

    /// Raise the emergency flag and shift the time base so the active
    /// script's `LAND` is due now.
    pub fn emergency_stop(&mut self, now: i64) {
        self.emergency.raise();
        self.time_anchor = now.saturating_sub(self.landing_time());
        warn!(time_anchor = self.time_anchor, "Emergency stop; schedule shifted to landing");
    }
}

fn time_ms(time: u64) -> i64 {
    i64::try_from(time).unwrap_or(i64::MAX)
}
