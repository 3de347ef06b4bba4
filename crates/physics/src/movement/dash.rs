//! Double-tap dash.
//!
//! Two move taps in roughly the same direction within `double_tap_window`
//! trigger a dash: velocity is replaced by `direction * strength`, the state
//! machine is held in Dashing for `dash_duration` and a cooldown starts.

use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::body::CharacterBody;
use crate::events::{DashCooldownFinished, DashExecuted, EventBus};
use crate::time::Timer;

use super::config::MovementConfig;
use super::integrator::VelocityIntegrator;
use super::state::{LocomotionStateMachine, MovementState};

const REQUIRED_TAPS: u32 = 2;

/// Dash tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashTiming {
    pub strength: f32,
    pub duration: f32,
    pub cooldown: f32,
    pub double_tap_window: f32,
    pub direction_match_threshold: f32,
}

impl From<&MovementConfig> for DashTiming {
    fn from(config: &MovementConfig) -> Self {
        Self {
            strength: config.dash_strength,
            duration: config.dash_duration,
            cooldown: config.dash_cooldown,
            double_tap_window: config.double_tap_window,
            direction_match_threshold: config.direction_match_threshold,
        }
    }
}

/// Gesture progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashGestureState {
    pub tap_count: u32,
    pub last_tap_time: f64,
    pub last_tap_direction: Vec2,
}

impl Default for DashGestureState {
    fn default() -> Self {
        Self {
            tap_count: 0,
            last_tap_time: f64::NEG_INFINITY,
            last_tap_direction: Vec2::ZERO,
        }
    }
}

/// Everything a tap may need to execute a dash.
pub struct DashContext<'a> {
    pub now: f64,
    /// Ground normal, or body up in the air.
    pub ground_normal: Vec3,
    pub body: &'a CharacterBody,
    pub integrator: &'a mut VelocityIntegrator,
    pub machine: &'a mut LocomotionStateMachine,
}

#[derive(Debug)]
pub struct DashGesture {
    timing: DashTiming,
    bus: Arc<EventBus>,
    gesture: DashGestureState,
    next_dash_allowed: f64,
    cooldown: Timer,
}

impl DashGesture {
    pub fn new(timing: DashTiming, bus: Arc<EventBus>) -> Self {
        Self {
            timing,
            bus,
            gesture: DashGestureState::default(),
            next_dash_allowed: f64::NEG_INFINITY,
            cooldown: Timer::default(),
        }
    }

    pub fn gesture(&self) -> &DashGestureState {
        &self.gesture
    }

    pub fn is_ready(&self, now: f64) -> bool {
        now >= self.next_dash_allowed
    }

    /// A discrete move tap. Returns true if it triggered a dash.
    pub fn on_move_tap(&mut self, raw: Vec2, ctx: DashContext<'_>) -> bool {
        let state = ctx.machine.state();
        if state == MovementState::Cutscene || !ctx.integrator.is_movement_input_allowed(state) {
            return false;
        }
        if raw.length_squared() < 0.001 {
            return false;
        }

        let direction = raw.normalize();
        let within_window = self.gesture.tap_count > 0
            && ctx.now - self.gesture.last_tap_time <= f64::from(self.timing.double_tap_window);
        let matches = within_window
            && direction.dot(self.gesture.last_tap_direction) >= self.timing.direction_match_threshold;

        self.gesture.tap_count = if matches { self.gesture.tap_count + 1 } else { 1 };
        self.gesture.last_tap_direction = direction;
        self.gesture.last_tap_time = ctx.now;

        if self.gesture.tap_count < REQUIRED_TAPS {
            return false;
        }

        if self.execute(direction, ctx) {
            self.gesture.tap_count = 0;
            self.gesture.last_tap_time = f64::NEG_INFINITY;
            true
        } else {
            self.gesture.tap_count = 1;
            false
        }
    }

    /// Publish the cooldown end once it is due.
    pub fn tick(&mut self, now: f64) {
        if self.cooldown.poll(now) {
            self.publish_ready();
        }
    }

    fn execute(&mut self, input: Vec2, ctx: DashContext<'_>) -> bool {
        if !self.is_ready(ctx.now) {
            return false;
        }

        let world = ctx.integrator.input_to_world(input);
        if world.length_squared() < 0.01 {
            return false;
        }
        let normal = ctx.ground_normal.normalize_or(Vec3::Y);
        let projected = world - normal * world.dot(normal);
        let direction = if projected.length_squared() >= 0.01 {
            projected.normalize()
        } else {
            world.normalize()
        };

        let velocity = ctx.integrator.pending_velocity(ctx.body);
        ctx.integrator
            .queue_velocity_change(direction * self.timing.strength - velocity);
        ctx.machine
            .temporarily_set_state(MovementState::Dashing, self.timing.duration, ctx.now);

        self.next_dash_allowed = ctx.now + f64::from(self.timing.cooldown);
        log::debug!("dash {direction} at {:.3}", ctx.now);
        self.bus.publish(&DashExecuted {
            direction,
            strength: self.timing.strength,
            duration: self.timing.duration,
        });

        if self.timing.cooldown > 0.0 {
            self.cooldown.start(ctx.now, self.timing.cooldown);
        } else {
            self.cooldown.cancel();
            self.publish_ready();
        }
        true
    }

    fn publish_ready(&self) {
        self.bus.publish(&DashCooldownFinished {
            ready_time: self.next_dash_allowed,
            cooldown: self.timing.cooldown,
        });
    }
}
