//! Drive state machine
//!
//! Owns whether control output actually reaches the wire. Whatever a
//! control source produces, only the `Driving` state passes it through;
//! `Paused` and `Faulted` always emit the safe action (full brake, no
//! throttle), so a confused source can never move the car.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use robocar_core::config::DriveMode;
use robocar_core::error::SessionFault;
use robocar_core::model::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    /// Connected, not driving. The initial state.
    Paused,
    /// Control source output reaches the wire.
    Driving,
    /// A session fault tripped; waiting for the scene reset to go out.
    Faulted,
}

pub struct DriveController {
    mode: DriveMode,
    state: DriveState,
    start_delay: Duration,
    /// When the auto-start grace period began; `None` in manual mode
    grace_started: Option<Instant>,
    reset_requested: bool,
    aborted: bool,
}

impl DriveController {
    pub fn new(mode: DriveMode, start_delay: Duration) -> Self {
        let grace_started = (mode != DriveMode::Manual).then(Instant::now);
        Self {
            mode,
            state: DriveState::Paused,
            start_delay,
            grace_started,
            reset_requested: false,
            aborted: false,
        }
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// In the autonomous modes, begin driving once the grace period after
    /// connect (or after a reset) has passed. Returns true on the tick
    /// driving starts, so the caller can arm the lap timer.
    pub fn tick_auto_start(&mut self) -> bool {
        if self.state != DriveState::Paused {
            return false;
        }
        match self.grace_started {
            Some(started) if started.elapsed() >= self.start_delay => {
                info!(mode = ?self.mode, "auto-start grace period over, driving");
                self.state = DriveState::Driving;
                true
            }
            _ => false,
        }
    }

    /// Apply a state-change request from the human device.
    pub fn apply_intent(&mut self, intent: crate::control::ControlIntent) {
        use crate::control::ControlIntent;
        match intent {
            ControlIntent::None => {}
            ControlIntent::Start => {
                if self.state != DriveState::Driving {
                    info!("drive started");
                    self.state = DriveState::Driving;
                }
            }
            ControlIntent::Stop => {
                if self.state == DriveState::Driving {
                    info!("drive stopped");
                }
                self.state = DriveState::Paused;
            }
            ControlIntent::Reset => {
                self.reset_requested = true;
            }
        }
    }

    /// Trip on a session fault: stop driving and request a session reset.
    /// `Faulted` is terminal for this session; recovery is a full teardown
    /// and a fresh scene load by the outer run loop.
    pub fn fault(&mut self, fault: &SessionFault) {
        warn!(%fault, "session fault, requesting session reset");
        self.state = DriveState::Faulted;
        self.reset_requested = true;
    }

    /// Whether a session reset is pending; clears the flag.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    /// End the session from within the loop.
    pub fn abort(&mut self) {
        self.aborted = true;
        self.state = DriveState::Paused;
    }

    /// Final gate between a control source and the wire.
    pub fn compose(&self, action: Action) -> Action {
        match self.state {
            DriveState::Driving => action,
            DriveState::Paused | DriveState::Faulted => Action::safe(),
        }
    }
}
