//! Reversible waypoint traversal.
//!
//! Elapsed times are kept in integer microseconds so that advancing by `d`
//! and then by `-d` lands on exactly the same traversal state, whatever `d`
//! is. A rewind scrubs platforms backwards through the same code path.

use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::easing::EasingCurve;
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::{EventBus, PlatformMoved};
use crate::time::{from_micros, to_micros};

use super::PlatformId;

/// Shortest allowed leg duration (seconds).
const MIN_TRAVEL_TIME: f32 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Time to travel one leg between waypoints (seconds).
    pub travel_time: f32,
    /// Pause at each waypoint (seconds).
    pub idle_time: f32,
    pub curve: EasingCurve,
    /// Reverse at the ends instead of wrapping to the first waypoint.
    pub ping_pong: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            travel_time: 2.0,
            idle_time: 0.5,
            curve: EasingCurve::EaseInOut,
            ping_pong: true,
        }
    }
}

impl PlatformConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            travel_time: if self.travel_time.is_finite() {
                self.travel_time.max(MIN_TRAVEL_TIME)
            } else {
                MIN_TRAVEL_TIME
            },
            idle_time: if self.idle_time.is_finite() {
                self.idle_time.max(0.0)
            } else {
                0.0
            },
            curve: self.curve,
            ping_pong: self.ping_pong,
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.travel_time >= MIN_TRAVEL_TIME) {
            return Err(PhysicsError::config(
                "travel_time",
                format!("must be at least {MIN_TRAVEL_TIME} s"),
            ));
        }
        if !(self.idle_time >= 0.0) {
            return Err(PhysicsError::config("idle_time", "must not be negative"));
        }
        Ok(())
    }
}

/// Where a platform is along its route.
///
/// While idling at `current_index` the platform waits to leave for
/// `next_index`; while moving it is between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformTraversalState {
    pub current_index: usize,
    pub next_index: usize,
    /// +1 or -1.
    pub travel_direction: i8,
    pub is_idling: bool,
    pub move_elapsed_us: i64,
    pub idle_elapsed_us: i64,
}

impl PlatformTraversalState {
    pub fn move_elapsed(&self) -> f32 {
        from_micros(self.move_elapsed_us)
    }

    pub fn idle_elapsed(&self) -> f32 {
        from_micros(self.idle_elapsed_us)
    }
}

/// Persisted platform progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformSaveState {
    pub platform: PlatformId,
    /// World position when captured.
    pub position: Vec3,
    pub traversal: PlatformTraversalState,
    /// Fraction of the current leg covered, for display and diagnostics.
    pub transition_progress: f32,
}

#[derive(Debug)]
pub struct PlatformScrubber {
    id: PlatformId,
    waypoints: Vec<Option<Vec3>>,
    /// Indices of present waypoints, ascending.
    valid: Vec<usize>,
    config: PlatformConfig,
    travel_us: i64,
    idle_us: i64,
    traversal: PlatformTraversalState,
    position: Vec3,
    frame_delta: Vec3,
    velocity: Vec3,
    delta_velocity: Vec3,
    bus: Arc<EventBus>,
}

impl PlatformScrubber {
    pub fn new(
        id: PlatformId,
        waypoints: Vec<Option<Vec3>>,
        config: PlatformConfig,
        bus: Arc<EventBus>,
    ) -> Self {
        let config = config.sanitized();
        let valid: Vec<usize> = waypoints
            .iter()
            .enumerate()
            .filter_map(|(index, waypoint)| waypoint.map(|_| index))
            .collect();

        if valid.len() < 2 {
            log::warn!("{id} has {} usable waypoints and will not move", valid.len());
        }

        let mut scrubber = Self {
            id,
            waypoints,
            valid,
            travel_us: to_micros(config.travel_time),
            idle_us: to_micros(config.idle_time),
            config,
            traversal: PlatformTraversalState {
                current_index: 0,
                next_index: 0,
                travel_direction: 1,
                is_idling: true,
                move_elapsed_us: 0,
                idle_elapsed_us: 0,
            },
            position: Vec3::ZERO,
            frame_delta: Vec3::ZERO,
            velocity: Vec3::ZERO,
            delta_velocity: Vec3::ZERO,
            bus,
        };

        if let Some(&first) = scrubber.valid.first() {
            let (next, direction) = scrubber.next_from(first, 1);
            scrubber.traversal.current_index = first;
            scrubber.traversal.next_index = next;
            scrubber.traversal.travel_direction = direction;
        }
        scrubber.position = scrubber.evaluate();
        scrubber
    }

    pub fn id(&self) -> PlatformId {
        self.id
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn traversal(&self) -> &PlatformTraversalState {
        &self.traversal
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Displacement during the last [`fixed_step`](Self::fixed_step).
    pub fn frame_delta(&self) -> Vec3 {
        self.frame_delta
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Change of velocity during the last step.
    pub fn delta_velocity(&self) -> Vec3 {
        self.delta_velocity
    }

    /// Fewer than two present waypoints.
    pub fn is_stationary(&self) -> bool {
        self.valid.len() < 2
    }

    /// Advance by `dt` and publish the move. Returns the displacement.
    pub fn fixed_step(&mut self, dt: f32) -> Vec3 {
        let previous = self.position;
        self.advance(dt);
        self.frame_delta = self.position - previous;

        let velocity = if dt != 0.0 {
            self.frame_delta / dt
        } else {
            Vec3::ZERO
        };
        self.delta_velocity = velocity - self.velocity;
        self.velocity = velocity;

        if self.frame_delta != Vec3::ZERO {
            self.bus.publish(&PlatformMoved {
                platform: self.id,
                frame_delta: self.frame_delta,
            });
        }
        self.frame_delta
    }

    /// Move along the route by `dt` seconds and re-evaluate the position.
    /// Negative values run backwards.
    pub fn advance(&mut self, dt: f32) {
        if self.is_stationary() {
            return;
        }

        let micros = to_micros(dt);
        if micros > 0 {
            self.advance_forward(micros);
        } else if micros < 0 {
            self.advance_backward(-micros);
        }
        self.position = self.evaluate();
    }

    fn advance_forward(&mut self, mut remaining: i64) {
        let travel = self.travel_us;
        let idle = self.idle_us;

        while remaining > 0 {
            let state = &mut self.traversal;
            if state.is_idling {
                let left = idle - state.idle_elapsed_us;
                if remaining <= left {
                    state.idle_elapsed_us += remaining;
                    return;
                }
                remaining -= left;
                state.is_idling = false;
                state.idle_elapsed_us = idle;
                state.move_elapsed_us = 0;
            }

            let state = &mut self.traversal;
            let left = travel - state.move_elapsed_us;
            if remaining < left {
                state.move_elapsed_us += remaining;
                return;
            }
            remaining -= left;
            self.arrive();
        }
    }

    fn advance_backward(&mut self, mut remaining: i64) {
        let travel = self.travel_us;
        let idle = self.idle_us;

        while remaining > 0 {
            let state = &mut self.traversal;
            if !state.is_idling {
                if remaining < state.move_elapsed_us {
                    state.move_elapsed_us -= remaining;
                    return;
                }
                remaining -= state.move_elapsed_us;
                state.is_idling = true;
                state.idle_elapsed_us = idle;
                state.move_elapsed_us = 0;
                if remaining == 0 {
                    return;
                }
            }

            let state = &mut self.traversal;
            if remaining <= state.idle_elapsed_us {
                state.idle_elapsed_us -= remaining;
                return;
            }
            remaining -= state.idle_elapsed_us;
            self.depart_backwards();
            self.traversal.move_elapsed_us = travel;
        }
    }

    /// Reach `next_index` and pick the following leg.
    fn arrive(&mut self) {
        let arrived = self.traversal.next_index;
        let (next, direction) = self.next_from(arrived, self.traversal.travel_direction);
        self.traversal = PlatformTraversalState {
            current_index: arrived,
            next_index: next,
            travel_direction: direction,
            is_idling: true,
            move_elapsed_us: 0,
            idle_elapsed_us: 0,
        };
    }

    /// Inverse of [`arrive`](Self::arrive): put the platform at the end of
    /// the leg that led to the current waypoint.
    fn depart_backwards(&mut self) {
        let current = self.traversal.current_index;
        let direction = self.traversal.travel_direction;

        let (previous, previous_direction) = if self.config.ping_pong {
            match self.step_index(current, -direction) {
                Some(candidate) => (candidate, direction),
                None => (self.traversal.next_index, -direction),
            }
        } else {
            (self.wrap_index(current, -direction), direction)
        };

        self.traversal = PlatformTraversalState {
            current_index: previous,
            next_index: current,
            travel_direction: previous_direction,
            is_idling: false,
            move_elapsed_us: 0,
            idle_elapsed_us: self.idle_us,
        };
    }

    /// Next leg out of `index` when travelling in `direction`.
    fn next_from(&self, index: usize, direction: i8) -> (usize, i8) {
        if self.config.ping_pong {
            match self.step_index(index, direction) {
                Some(next) => (next, direction),
                None => (self.step_index(index, -direction).unwrap_or(index), -direction),
            }
        } else {
            (self.wrap_index(index, direction), direction)
        }
    }

    /// Neighbouring present waypoint in `direction`, without wrapping.
    fn step_index(&self, index: usize, direction: i8) -> Option<usize> {
        if direction > 0 {
            self.valid.iter().copied().find(|&candidate| candidate > index)
        } else {
            self.valid.iter().rev().copied().find(|&candidate| candidate < index)
        }
    }

    fn wrap_index(&self, index: usize, direction: i8) -> usize {
        self.step_index(index, direction).unwrap_or_else(|| {
            let wrapped = if direction > 0 {
                self.valid.first()
            } else {
                self.valid.last()
            };
            wrapped.copied().unwrap_or(index)
        })
    }

    fn waypoint(&self, index: usize) -> Vec3 {
        self.waypoints.get(index).copied().flatten().unwrap_or(self.position)
    }

    fn evaluate(&self) -> Vec3 {
        let state = &self.traversal;
        if self.valid.is_empty() {
            return Vec3::ZERO;
        }
        if state.is_idling || self.is_stationary() {
            return self.waypoint(state.current_index);
        }

        let t = state.move_elapsed_us as f32 / self.travel_us as f32;
        let from = self.waypoint(state.current_index);
        let to = self.waypoint(state.next_index);
        from.lerp(to, self.config.curve.evaluate(t))
    }

    pub fn capture_save_state(&self) -> PlatformSaveState {
        let transition_progress = if self.traversal.is_idling {
            0.0
        } else {
            self.traversal.move_elapsed_us as f32 / self.travel_us as f32
        };
        PlatformSaveState {
            platform: self.id,
            position: self.position,
            traversal: self.traversal,
            transition_progress,
        }
    }

    /// Apply saved progress. Invalid data leaves the platform untouched.
    pub fn restore_save_state(&mut self, data: &PlatformSaveState) -> PhysicsResult<()> {
        if data.platform != self.id {
            return Err(PhysicsError::InvalidSaveState(format!(
                "state for {} restored onto {}",
                data.platform, self.id
            )));
        }

        let state = data.traversal;
        let present = |index: usize| self.waypoints.get(index).is_some_and(Option::is_some);
        if !present(state.current_index) || !present(state.next_index) {
            return Err(PhysicsError::InvalidSaveState(format!(
                "{}: waypoint index out of range ({} -> {})",
                self.id, state.current_index, state.next_index
            )));
        }
        if state.travel_direction != 1 && state.travel_direction != -1 {
            return Err(PhysicsError::InvalidSaveState(format!(
                "{}: travel direction {}",
                self.id, state.travel_direction
            )));
        }
        if !(0..=self.travel_us).contains(&state.move_elapsed_us)
            || !(0..=self.idle_us).contains(&state.idle_elapsed_us)
        {
            return Err(PhysicsError::InvalidSaveState(format!(
                "{}: elapsed time outside the leg",
                self.id
            )));
        }
        if !data.position.is_finite() {
            return Err(PhysicsError::InvalidSaveState(format!(
                "{}: position {}",
                self.id, data.position
            )));
        }

        self.traversal = state;
        self.position = data.position;
        self.frame_delta = Vec3::ZERO;
        self.velocity = Vec3::ZERO;
        self.delta_velocity = Vec3::ZERO;
        Ok(())
    }
}
