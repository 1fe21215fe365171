//! Countdown timer for questions and sessions.
//!
//! The controller is a plain state machine advanced one second at a time by
//! [`TimerController::tick`]. Whoever owns it (the session, driven by the
//! async [`crate::session::SessionDriver`]) supplies the ticks, so there is
//! never more than one periodic callback per controller and tests can step
//! it deterministically.
//!
//! # States
//!
//! - **Stopped**: not counting; `tick` is a no-op
//! - **Running**: each `tick` removes one second
//!
//! Reaching zero while running emits exactly one [`TimerEvent::Expired`]
//! and moves the controller back to `Stopped`.

use serde::{Deserialize, Serialize};

/// State of a timer controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    /// Not counting down
    Stopped,
    /// Counting down one second per tick
    Running,
}

/// Notification produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// The countdown reached zero while running.
    Expired,
}

/// Monotonically decreasing one-second countdown.
#[derive(Debug, Clone)]
pub struct TimerController {
    state: TimerState,
    remaining_secs: u64,
}

impl Default for TimerController {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerController {
    /// Create a stopped controller with nothing on the clock.
    pub fn new() -> Self {
        Self {
            state: TimerState::Stopped,
            remaining_secs: 0,
        }
    }

    /// Start counting down from `duration_secs`.
    ///
    /// Starting with zero seconds leaves the controller stopped: there is
    /// nothing to count and nothing may expire.
    pub fn start(&mut self, duration_secs: u64) {
        self.remaining_secs = duration_secs;
        self.state = if duration_secs > 0 {
            TimerState::Running
        } else {
            TimerState::Stopped
        };
    }

    /// Stop counting, keeping the remaining time.
    pub fn pause(&mut self) {
        self.state = TimerState::Stopped;
    }

    /// Continue a paused countdown.
    pub fn resume(&mut self) {
        if self.remaining_secs > 0 {
            self.state = TimerState::Running;
        }
    }

    /// Stop and put `duration_secs` back on the clock without running.
    pub fn reset(&mut self, duration_secs: u64) {
        self.state = TimerState::Stopped;
        self.remaining_secs = duration_secs;
    }

    /// Advance one second.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if self.state != TimerState::Running {
            return None;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = TimerState::Stopped;
            return Some(TimerEvent::Expired);
        }
        None
    }

    /// Current state
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Whether the countdown is running
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Seconds left on the clock
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }
}
