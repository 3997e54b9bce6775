//! Countdown timer with bonus injection

use serde::{Deserialize, Serialize};

use crate::countdown_done;

/// Result of advancing the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Running,
    /// Reached zero on this tick
    Expired,
    Stopped,
}

/// Countdown clamped to `[0, max]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timer {
    remaining: f32,
    max: f32,
    running: bool,
}

impl Timer {
    /// Full, stopped timer
    pub fn new(max: f32) -> Self {
        Self {
            remaining: max,
            max,
            running: false,
        }
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Remaining time as a fraction of the maximum (for a progress bar)
    pub fn fraction(&self) -> f32 {
        self.remaining / self.max
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Refill and stop
    pub fn reset(&mut self) {
        self.remaining = self.max;
        self.running = false;
    }

    /// Count down by `dt` seconds; reports `Expired` once, on the tick that hits zero
    pub fn tick(&mut self, dt: f32) -> TimerStatus {
        if !self.running {
            return TimerStatus::Stopped;
        }
        self.remaining = (self.remaining - dt).max(0.0);
        if countdown_done(self.remaining, dt) {
            self.remaining = 0.0;
            self.running = false;
            TimerStatus::Expired
        } else {
            TimerStatus::Running
        }
    }

    /// Add bonus seconds, never exceeding the maximum. Returns the new remaining time.
    pub fn add_bonus(&mut self, amount: f32) -> f32 {
        self.remaining = (self.remaining + amount).clamp(0.0, self.max);
        self.remaining
    }
}
