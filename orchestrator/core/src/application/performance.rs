// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Performance Runner
//!
//! The cooperative timer loop around [`Scheduler`]. One runner owns the
//! schedule state for a node; everything else talks to it through a
//! [`PerformanceHandle`], which turns network messages and operator input
//! into [`PerformanceEvent`]s on a channel.
//!
//! ```text
//! Idle --Start--> AwaitingMusic --MusicFinished--> Running --END--> Completed
//!   \________________Start (no music)______________/
//! ```
//!
//! Takeoff and land are slow, so they run as spawned tasks and report back
//! on the same channel. LED and control commands are awaited inline.
//!
//! # Architecture
//!
//! - **Layer:** Application
//! - **Purpose:** Single writer of schedule state; drives actuator calls

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::domain::collaborators::{
    Actuator, ActuatorError, Clock, MusicOutcome, MusicService, PoseSource,
};
use crate::domain::schedule::{Action, EmergencyFlag, Scheduler};
use crate::domain::script::DanceScript;

#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceEvent {
    Start { dance_index: u8 },
    EmergencyStop,
    MusicFinished(MusicOutcome),
    TakeoffFinished(Result<(), ActuatorError>),
    LandFinished(Result<(), ActuatorError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceOutcome {
    Completed { dance_index: u8 },
    /// Emergency stop before the performance clock started.
    Aborted,
}

/// Cloneable sender side of a [`PerformanceRunner`].
#[derive(Debug, Clone)]
pub struct PerformanceHandle {
    events: mpsc::UnboundedSender<PerformanceEvent>,
    emergency: EmergencyFlag,
}

impl PerformanceHandle {
    /// Returns `false` once the runner has finished.
    pub fn start(&self, dance_index: u8) -> bool {
        self.events.send(PerformanceEvent::Start { dance_index }).is_ok()
    }

    /// Local emergency stop: raise the flag and shift the schedule to landing.
    pub fn emergency_stop(&self) {
        self.emergency.raise();
        let _ = self.events.send(PerformanceEvent::EmergencyStop);
    }

    /// Set the flag only; what a follower does on an EMERGENCY message.
    pub fn raise_emergency(&self) {
        self.emergency.raise();
    }

    pub fn emergency(&self) -> EmergencyFlag {
        self.emergency.clone()
    }
}

/// Collaborators and settings shared by every phase of a run.
struct Performer {
    drone_id: i32,
    actuator: Arc<dyn Actuator>,
    pose: Arc<dyn PoseSource>,
    clock: Arc<dyn Clock>,
    music: Option<Arc<dyn MusicService>>,
    flying_allowed: bool,
    emergency: EmergencyFlag,
    events: mpsc::UnboundedSender<PerformanceEvent>,
}

pub struct PerformanceRunner {
    performer: Performer,
    dances: Vec<Arc<DanceScript>>,
    receiver: mpsc::UnboundedReceiver<PerformanceEvent>,
}

impl PerformanceRunner {
    pub fn new(
        drone_id: i32,
        dances: Vec<DanceScript>,
        actuator: Arc<dyn Actuator>,
        pose: Arc<dyn PoseSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            performer: Performer {
                drone_id,
                actuator,
                pose,
                clock,
                music: None,
                flying_allowed: true,
                emergency: EmergencyFlag::new(),
                events,
            },
            dances: dances.into_iter().map(Arc::new).collect(),
            receiver,
        }
    }

    /// Play a track before anchoring the clock (coordinator only).
    pub fn with_music(mut self, music: Arc<dyn MusicService>) -> Self {
        self.performer.music = Some(music);
        self
    }

    pub fn with_flying_allowed(mut self, flying_allowed: bool) -> Self {
        self.performer.flying_allowed = flying_allowed;
        self
    }

    pub fn handle(&self) -> PerformanceHandle {
        PerformanceHandle {
            events: self.performer.events.clone(),
            emergency: self.performer.emergency.clone(),
        }
    }

    pub fn dance_count(&self) -> usize {
        self.dances.len()
    }

    /// Wait for a start, run that performance to its `END`, and return.
    pub async fn run(self) -> PerformanceOutcome {
        let PerformanceRunner {
            performer,
            dances,
            mut receiver,
        } = self;

        let Some(dance_index) = performer.await_start(&dances, &mut receiver).await else {
            return PerformanceOutcome::Aborted;
        };
        let script = Arc::clone(&dances[dance_index as usize]);

        if let Some(music) = performer.music.clone() {
            let events = performer.events.clone();
            tokio::spawn(async move {
                let outcome = music.play_track(dance_index).await;
                let _ = events.send(PerformanceEvent::MusicFinished(outcome));
            });
            if !performer.await_music(&mut receiver).await {
                return PerformanceOutcome::Aborted;
            }
        }

        performer.perform(dance_index, script, &mut receiver).await
    }
}

// ============================================================================
// Phases
// ============================================================================

impl Performer {
    async fn await_start(
        &self,
        dances: &[Arc<DanceScript>],
        receiver: &mut mpsc::UnboundedReceiver<PerformanceEvent>,
    ) -> Option<u8> {
        info!(drone_id = self.drone_id, dances = dances.len(), "Ready for start signal");
        while let Some(event) = receiver.recv().await {
            match event {
                PerformanceEvent::Start { dance_index } if (dance_index as usize) < dances.len() => {
                    info!(dance_index, "Start signal received");
                    return Some(dance_index);
                }
                PerformanceEvent::Start { dance_index } => {
                    warn!(dance_index, loaded = dances.len(), "Start for unknown dance ignored");
                }
                PerformanceEvent::EmergencyStop => {
                    warn!("Emergency stop before start");
                    return None;
                }
                other => debug!(event = ?other, "Event ignored while idle"),
            }
        }
        None
    }

    /// `false` if an emergency stop arrived first.
    async fn await_music(&self, receiver: &mut mpsc::UnboundedReceiver<PerformanceEvent>) -> bool {
        while let Some(event) = receiver.recv().await {
            match event {
                PerformanceEvent::MusicFinished(outcome) => {
                    match &outcome {
                        MusicOutcome::Playing => info!("Music started"),
                        MusicOutcome::Skipped => info!("No music server; starting without music"),
                        MusicOutcome::Failed(reason) => warn!(reason = %reason, "Starting without music"),
                    }
                    return true;
                }
                PerformanceEvent::EmergencyStop => {
                    warn!("Emergency stop while waiting for music");
                    return false;
                }
                PerformanceEvent::Start { dance_index } => {
                    warn!(dance_index, "Already starting; start ignored")
                }
                other => debug!(event = ?other, "Event ignored while waiting for music"),
            }
        }
        false
    }

    async fn perform(
        &self,
        dance_index: u8,
        script: Arc<DanceScript>,
        receiver: &mut mpsc::UnboundedReceiver<PerformanceEvent>,
    ) -> PerformanceOutcome {
        let start = self.clock.now_ms();
        let mut scheduler = Scheduler::new(script, start, self.emergency.clone(), self.flying_allowed);
        let mut deadline = Instant::now() + Duration::from_millis(scheduler.how_much_to_wait(start));
        info!(dance_index, instructions = scheduler.main_script().len(), "Performance started");

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    let now = self.clock.now_ms();
                    let action = scheduler.execute(now, || self.pose.estimate(self.drone_id));
                    if let Some(action) = action {
                        if self.dispatch(action, &mut scheduler).await {
                            info!(dance_index, "Performance completed");
                            return PerformanceOutcome::Completed { dance_index };
                        }
                    }
                    let wait = scheduler.how_much_to_wait(self.clock.now_ms());
                    deadline = Instant::now() + Duration::from_millis(wait);
                }
                Some(event) = receiver.recv() => match event {
                    PerformanceEvent::EmergencyStop => {
                        let now = self.clock.now_ms();
                        scheduler.emergency_stop(now);
                        deadline = Instant::now() + Duration::from_millis(scheduler.pending_delay(now));
                    }
                    PerformanceEvent::TakeoffFinished(result) => {
                        if let Err(e) = &result {
                            warn!(error = %e, "Takeoff failed");
                        }
                        scheduler.on_takeoff_finished(result.is_ok());
                    }
                    PerformanceEvent::LandFinished(result) => {
                        let landed = self.settle_landing(result).await;
                        scheduler.on_land_finished(landed);
                    }
                    PerformanceEvent::Start { dance_index } => {
                        warn!(dance_index, "Performance in progress; start ignored");
                    }
                    PerformanceEvent::MusicFinished(_) => {}
                },
            }
        }
    }

    /// Run one action; `true` when the performance is over.
    async fn dispatch(&self, action: Action, scheduler: &mut Scheduler) -> bool {
        match action {
            Action::Takeoff => {
                let actuator = Arc::clone(&self.actuator);
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = actuator.takeoff().await;
                    let _ = events.send(PerformanceEvent::TakeoffFinished(result));
                });
            }
            Action::Land => {
                let actuator = Arc::clone(&self.actuator);
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = actuator.land().await;
                    let _ = events.send(PerformanceEvent::LandFinished(result));
                });
            }
            Action::SetLeds(on) => {
                if let Err(e) = self.actuator.set_leds(on).await {
                    warn!(error = %e, on, "LED command failed");
                }
            }
            Action::Control(command) => {
                if let Err(e) = self.actuator.send_control(command).await {
                    debug!(error = %e, "Control command failed");
                }
            }
            Action::Finish { land } => {
                if land {
                    let result = self.actuator.land().await;
                    let landed = self.settle_landing(result).await;
                    scheduler.on_land_finished(landed);
                }
                return true;
            }
        }
        false
    }

    async fn settle_landing(&self, result: Result<(), ActuatorError>) -> bool {
        match result {
            Ok(()) => {
                info!(drone_id = self.drone_id, "Landed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Landing failed");
                if self.emergency.is_raised() {
                    if let Err(e) = self.actuator.confirm_forced_landing().await {
                        warn!(error = %e, "Forced landing confirmation failed");
                    }
                }
                false
            }
        }
    }
}
