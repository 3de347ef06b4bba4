//! Movement state arbitration.
//!
//! Exactly one [`MovementState`] owns the character at a time. Externally
//! driven states (Dashing, Cutscene) hold a timed lock that rejects any
//! transition to a different state until it expires.

use serde::{Deserialize, Serialize};

use crate::time::Timer;

/// Which subsystem currently owns the character's movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementState {
    /// Grounded locomotion.
    #[default]
    Default,
    /// Off the ground under normal control.
    Airborne,
    /// Dash impulse in progress; gravity may be suspended.
    Dashing,
    /// Scripted movement. Movement input is ignored.
    Cutscene,
}

/// State and lock to return to when a temporary state expires.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    state: MovementState,
    locked_until: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TemporaryState {
    state: MovementState,
    baseline: Baseline,
}

/// Finite state machine with timed locks.
///
/// `set_state` is rejected while locked to another state. A temporary state
/// captures the state it interrupts and restores it when its timer fires,
/// provided nothing else replaced the temporary state in the meantime.
///
/// Overlapping temporary states share one baseline: a second temporary call
/// replaces the pending timer but keeps the state that was active before the
/// first one, so the eventual restore never lands on the interrupted
/// temporary state.
#[derive(Debug, Clone, Default)]
pub struct LocomotionStateMachine {
    state: MovementState,
    /// Absolute time the lock releases. 0 means unlocked.
    locked_until: f64,
    temporary: Option<TemporaryState>,
    timer: Timer,
}

impl LocomotionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    pub fn locked_until(&self) -> f64 {
        self.locked_until
    }

    pub fn is_locked(&self, now: f64) -> bool {
        now < self.locked_until
    }

    /// Whether a temporary state is waiting to be restored.
    pub fn has_temporary_state(&self) -> bool {
        self.timer.is_pending()
    }

    fn accepts(&self, state: MovementState, now: f64) -> bool {
        !self.is_locked(now) || self.state == state
    }

    /// Enter `state`, locking it for `lock` seconds when positive.
    ///
    /// Returns false, changing nothing, if locked to a different state.
    pub fn set_state(&mut self, state: MovementState, lock: f32, now: f64) -> bool {
        if !self.accepts(state, now) {
            return false;
        }

        self.state = state;
        self.locked_until = if lock > 0.0 {
            now + f64::from(lock)
        } else {
            0.0
        };
        true
    }

    /// Enter `state` locked for `duration`, then restore what was there before.
    ///
    /// A non-positive duration behaves like [`set_state`](Self::set_state)
    /// with no lock.
    pub fn temporarily_set_state(&mut self, state: MovementState, duration: f32, now: f64) -> bool {
        if duration <= 0.0 {
            return self.set_state(state, duration, now);
        }
        if !self.accepts(state, now) {
            return false;
        }

        let baseline = match self.temporary {
            Some(active) if self.timer.is_pending() => active.baseline,
            _ => Baseline {
                state: self.state,
                locked_until: self.locked_until,
            },
        };

        self.timer.cancel();
        self.set_state(state, duration, now);
        self.temporary = Some(TemporaryState { state, baseline });
        self.timer.start(now, duration);
        true
    }

    /// Cut a pending temporary state short. Returns true if the baseline
    /// was restored.
    pub fn end_temporary_state(&mut self, _now: f64) -> bool {
        if !self.timer.is_pending() {
            return false;
        }
        self.timer.cancel();
        self.restore_baseline()
    }

    /// Fire the temporary-state timer when due.
    pub fn tick(&mut self, now: f64) {
        if self.timer.poll(now) {
            self.restore_baseline();
        }
    }

    /// Airborne reverts to Default once grounded and unlocked.
    pub fn auto_transition(&mut self, grounded: bool, now: f64) {
        if grounded && !self.is_locked(now) && self.state == MovementState::Airborne {
            self.state = MovementState::Default;
        }
    }

    fn restore_baseline(&mut self) -> bool {
        let Some(temporary) = self.temporary.take() else {
            return false;
        };
        if self.state != temporary.state {
            return false;
        }

        log::debug!(
            "temporary {:?} ended, restoring {:?}",
            temporary.state,
            temporary.baseline.state
        );
        self.state = temporary.baseline.state;
        self.locked_until = temporary.baseline.locked_until;
        true
    }
}
