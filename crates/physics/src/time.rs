//! Simulation time primitives.
//!
//! Time is passed explicitly into every component as a [`Tick`]. Deferred work
//! (state reverts, cooldowns) is expressed as [`Timer`] deadlines that the
//! owning component polls during its own tick, so cancelling is just clearing
//! the deadline.

use serde::{Deserialize, Serialize};

/// Microseconds per second, used for exact integer time accounting.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Timing information for one fixed simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Simulation time at the start of this step (seconds).
    pub now: f64,
    /// Fixed step length (seconds). May be negative when scrubbing backwards.
    pub dt: f32,
}

impl Tick {
    pub fn new(now: f64, dt: f32) -> Self {
        Self { now, dt }
    }

    /// Time at the end of this step.
    pub fn end(&self) -> f64 {
        self.now + f64::from(self.dt)
    }
}

/// Convert a duration in seconds to whole microseconds.
///
/// Rounding is symmetric, so `to_micros(-x) == -to_micros(x)`.
#[inline]
pub fn to_micros(seconds: f32) -> i64 {
    (f64::from(seconds) * MICROS_PER_SECOND).round() as i64
}

/// Convert whole microseconds back to seconds.
#[inline]
pub fn from_micros(micros: i64) -> f32 {
    (micros as f64 / MICROS_PER_SECOND) as f32
}

/// A cancellable one-shot deadline.
///
/// ```ignore
/// let mut timer = Timer::default();
/// timer.start(now, 0.25);
/// // later, every tick:
/// if timer.poll(now) { /* fired exactly once */ }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    deadline: Option<f64>,
}

impl Timer {
    /// Arm the timer, replacing any pending deadline.
    pub fn start(&mut self, now: f64, duration: f32) {
        self.deadline = Some(now + f64::from(duration.max(0.0)));
    }

    /// Disarm the timer. A cancelled timer never fires.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether the timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Deadline of the pending timer, if armed.
    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    /// Returns true once when `now` reaches the deadline, then disarms.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Seconds until the deadline (0 when not armed or already due).
    pub fn remaining(&self, now: f64) -> f32 {
        self.deadline
            .map(|deadline| (deadline - now).max(0.0) as f32)
            .unwrap_or(0.0)
    }
}
