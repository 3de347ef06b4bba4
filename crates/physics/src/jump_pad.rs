//! Jump pads.
//!
//! A pad is an overlap-only brush. A character touching it has its velocity
//! replaced by a boost along the pad direction, at most once per
//! `min_boost_interval`. With a landing target the vertical part of the boost
//! is corrected so the ballistic arc reaches it, and the character is held
//! Airborne for the estimated travel time.

use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::body::CharacterBody;
use crate::collision::{BrushId, CollisionWorld, ContentFlags};
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::{EventBus, JumpPadBoost};
use crate::movement::{LocomotionStateMachine, MovementState, VelocityIntegrator};

const FALLBACK_GRAVITY: f32 = 9.81;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpPadConfig {
    /// Speed of the boost along `direction` (meters/second).
    pub boost_force: f32,
    /// Minimum time between two boosts of the same character (seconds).
    pub min_boost_interval: f32,
    /// Boost direction. Normalized on use; zero means straight up.
    pub direction: Vec3,
    /// Point the boost should land on.
    pub landing_target: Option<Vec3>,
    pub min_travel_time: f32,
    pub max_travel_time: f32,
}

impl Default for JumpPadConfig {
    fn default() -> Self {
        Self {
            boost_force: 18.0,
            min_boost_interval: 0.1,
            direction: Vec3::Y,
            landing_target: None,
            min_travel_time: 0.15,
            max_travel_time: 1.2,
        }
    }
}

impl JumpPadConfig {
    pub fn sanitized(&self) -> Self {
        let min_travel_time = self.min_travel_time.max(0.0);
        Self {
            boost_force: self.boost_force.max(0.0),
            min_boost_interval: self.min_boost_interval.max(0.0),
            direction: self.direction.normalize_or(Vec3::Y),
            landing_target: self.landing_target,
            min_travel_time,
            max_travel_time: self.max_travel_time.max(min_travel_time),
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.boost_force >= 0.0) {
            return Err(PhysicsError::config("boost_force", "must not be negative"));
        }
        if !(self.min_boost_interval >= 0.0) {
            return Err(PhysicsError::config("min_boost_interval", "must not be negative"));
        }
        if self.max_travel_time < self.min_travel_time {
            return Err(PhysicsError::config(
                "max_travel_time",
                "must not be below min_travel_time",
            ));
        }
        Ok(())
    }
}

/// Parts of the character a boost acts on.
pub struct BoostContext<'a> {
    pub now: f64,
    pub body: &'a CharacterBody,
    pub integrator: &'a mut VelocityIntegrator,
    pub machine: &'a mut LocomotionStateMachine,
}

#[derive(Debug)]
pub struct JumpPad {
    brush: BrushId,
    config: JumpPadConfig,
    last_boost: Option<f64>,
}

impl JumpPad {
    pub fn new(brush: BrushId, config: JumpPadConfig) -> Self {
        Self {
            brush,
            config: config.sanitized(),
            last_boost: None,
        }
    }

    pub fn brush(&self) -> BrushId {
        self.brush
    }

    pub fn config(&self) -> &JumpPadConfig {
        &self.config
    }

    fn can_boost(&self, now: f64) -> bool {
        self.last_boost
            .map_or(true, |last| now - last >= f64::from(self.config.min_boost_interval))
    }

    /// Boost the character if the pad is armed. Returns the applied change.
    pub fn try_boost(
        &mut self,
        contact_point: Vec3,
        ctx: BoostContext<'_>,
        bus: &EventBus,
    ) -> Option<Vec3> {
        if self.config.boost_force <= 0.0 || !self.can_boost(ctx.now) {
            return None;
        }
        self.last_boost = Some(ctx.now);

        let direction = self.config.direction;
        let mut boost = direction * self.config.boost_force;
        let mut travel_time = None;

        if let Some(target) = self.config.landing_target {
            let up = Vec3::Y;
            let gravity = match ctx.body.config().gravity {
                g if g > f32::EPSILON => g,
                _ => FALLBACK_GRAVITY,
            };
            let start = ctx.body.position + ctx.body.shape().center_offset();
            let time = self.estimate_travel_time(target - start, gravity);

            let vertical_distance = (target - start).dot(up);
            let needed = (vertical_distance + 0.5 * gravity * time * time) / time.max(0.01);
            boost += up * (needed - boost.dot(up));
            travel_time = Some(time);
        }

        // The boost replaces whatever velocity the character had
        let pending = ctx.integrator.pending_velocity(ctx.body);
        ctx.integrator.queue_velocity_change(boost - pending);

        if let Some(time) = travel_time {
            ctx.machine.set_state(
                MovementState::Airborne,
                time.max(self.config.min_travel_time),
                ctx.now,
            );
        }

        let force = boost.length();
        log::debug!("jump pad {:?} boost {boost} at {:.3}", self.brush, ctx.now);
        if force > f32::EPSILON {
            bus.publish(&JumpPadBoost {
                contact_point,
                direction,
                force,
            });
        }
        Some(boost)
    }

    /// Flight time toward a target `displacement` away, clamped to the
    /// configured travel range.
    fn estimate_travel_time(&self, displacement: Vec3, gravity: f32) -> f32 {
        let direction = self.config.direction;
        let speed = self.config.boost_force;
        let forward_distance = displacement.dot(direction);
        let forward_speed = speed;
        let vertical_speed = direction.dot(Vec3::Y) * speed;
        let vertical_distance = displacement.dot(Vec3::Y);

        let time = if forward_distance.abs() > 0.01 && forward_speed.abs() > 0.01 {
            (forward_distance / forward_speed).abs()
        } else {
            // 0.5 g t² - v t + d = 0, later root
            let a = 0.5 * gravity;
            let b = -vertical_speed;
            let discriminant = b * b - 4.0 * a * vertical_distance;
            if discriminant >= 0.0 {
                (-b + discriminant.sqrt()) / (2.0 * a)
            } else {
                self.config.max_travel_time
            }
        };
        time.clamp(self.config.min_travel_time, self.config.max_travel_time)
    }
}

/// Every jump pad in a level.
#[derive(Debug)]
pub struct JumpPadSet {
    pads: Vec<JumpPad>,
    bus: Arc<EventBus>,
}

impl JumpPadSet {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { pads: Vec::new(), bus }
    }

    /// Add an overlap-only pad brush to `world` and register it.
    pub fn add(
        &mut self,
        world: &mut CollisionWorld,
        center: Vec3,
        half_extents: Vec3,
        config: JumpPadConfig,
    ) -> BrushId {
        let brush = world.add_box(center, half_extents, ContentFlags::JUMP_PAD);
        self.pads.push(JumpPad::new(brush, config));
        brush
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JumpPad> {
        self.pads.iter()
    }

    /// Boost the character from every pad it touches. Returns true if any fired.
    pub fn apply_overlapping(&mut self, world: &CollisionWorld, ctx: BoostContext<'_>) -> bool {
        if self.pads.is_empty() {
            return false;
        }
        let touching = world.overlapping(ctx.body.position, ctx.body.shape(), ContentFlags::JUMP_PAD);
        if touching.is_empty() {
            return false;
        }

        let BoostContext {
            now,
            body,
            integrator,
            machine,
        } = ctx;
        let mut boosted = false;
        for pad in self.pads.iter_mut().filter(|pad| touching.contains(&pad.brush)) {
            let ctx = BoostContext {
                now,
                body,
                integrator: &mut *integrator,
                machine: &mut *machine,
            };
            boosted |= pad.try_boost(body.position, ctx, &self.bus).is_some();
        }
        boosted
    }
}
