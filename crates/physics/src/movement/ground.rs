//! Ground contact classification.
//!
//! Once per fixed step the sensor sweeps a small sphere below the feet and
//! decides whether the character stands on something. Platforms that rise
//! faster than gravity pulls the body down open a one-frame gap under the
//! feet; a short grace window keeps the contact through that gap.

use std::sync::Arc;

use glam::Vec3;

use crate::body::CharacterBody;
use crate::collision::{BrushId, CollisionWorld, ContentFlags};
use crate::error::PhysicsError;
use crate::events::{EventBus, GroundedChanged, Landed, MovingPlatformEntered, Ungrounded};
use crate::platform::{PlatformId, PlatformMotion};

use super::config::GroundSensorConfig;

/// Start height of the probe ray when the probe radius is zero.
const RAY_LIFT: f32 = 0.05;

/// Platform displacement below this is treated as standing still.
const RISING_EPSILON: f32 = 1e-6;

/// Result of the last ground probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundState {
    pub is_grounded: bool,
    /// Unit contact normal, or the body's up axis when ungrounded.
    pub normal: Vec3,
    /// Contact point, or the body position when ungrounded.
    pub hit_point: Vec3,
    pub surface: Option<BrushId>,
    pub platform: Option<PlatformId>,
}

impl GroundState {
    fn airborne(position: Vec3, up: Vec3) -> Self {
        Self {
            is_grounded: false,
            normal: up,
            hit_point: position,
            surface: None,
            platform: None,
        }
    }
}

impl Default for GroundState {
    fn default() -> Self {
        Self::airborne(Vec3::ZERO, Vec3::Y)
    }
}

/// Grounded edge detected this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundTransition {
    None,
    Landed,
    Ungrounded,
}

/// Per-step ground classifier.
#[derive(Debug)]
pub struct GroundSensor {
    config: GroundSensorConfig,
    bus: Arc<EventBus>,
    state: GroundState,
    was_grounded: bool,
    last_grounded_time: f64,
    /// Most recent grounded result, reused by the platform grace rule.
    last_contact: GroundState,
    platform_effect_block_until: f64,
    warned_missing_world: bool,
}

impl GroundSensor {
    pub fn new(config: GroundSensorConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            state: GroundState::default(),
            was_grounded: false,
            last_grounded_time: f64::NEG_INFINITY,
            last_contact: GroundState::default(),
            platform_effect_block_until: f64::NEG_INFINITY,
            warned_missing_world: false,
        }
    }

    pub fn state(&self) -> &GroundState {
        &self.state
    }

    pub fn is_grounded(&self) -> bool {
        self.state.is_grounded
    }

    /// Grounded on something a platform carries.
    pub fn is_grounded_on_platform(&self) -> bool {
        self.state.is_grounded && self.state.platform.is_some()
    }

    /// Platform velocity reads should be ignored until this window closes.
    pub fn is_platform_effect_blocked(&self, now: f64) -> bool {
        now < self.platform_effect_block_until
    }

    pub fn last_grounded_time(&self) -> f64 {
        self.last_grounded_time
    }

    /// Probe the ground and publish any resulting events.
    ///
    /// Without a collision world the character is never grounded.
    pub fn tick(
        &mut self,
        world: Option<&CollisionWorld>,
        platforms: &dyn PlatformMotion,
        body: &CharacterBody,
        now: f64,
    ) -> GroundTransition {
        let up = body.up();

        let mut next = match world {
            Some(world) => self.probe(world, body, up),
            None => {
                if !self.warned_missing_world {
                    let err = PhysicsError::MissingCollaborator("collision world");
                    log::warn!("ground sensor: {err}; treating as airborne");
                    self.warned_missing_world = true;
                }
                GroundState::airborne(body.position, up)
            }
        };

        let entered_platform = next.platform.filter(|platform| {
            !self.was_grounded || self.state.platform != Some(*platform)
        });
        let entry_was_blocked = self.is_platform_effect_blocked(now);
        if entered_platform.is_some() {
            self.platform_effect_block_until =
                now + f64::from(self.config.platform_effect_block_window);
        }

        if !next.is_grounded && self.was_grounded && self.within_platform_grace(platforms, body, now) {
            next = self.last_contact;
        }

        let transition = match (self.was_grounded, next.is_grounded) {
            (false, true) => GroundTransition::Landed,
            (true, false) => GroundTransition::Ungrounded,
            _ => GroundTransition::None,
        };

        self.state = next;
        if next.is_grounded {
            self.last_grounded_time = now;
            self.last_contact = next;
        }
        self.was_grounded = next.is_grounded;

        match transition {
            GroundTransition::Landed => {
                self.bus.publish(&Landed {
                    time: now,
                    position: body.position,
                });
            }
            GroundTransition::Ungrounded => {
                self.bus.publish(&Ungrounded {
                    time: now,
                    position: body.position,
                    rotation: body.rotation,
                    velocity: body.velocity(),
                });
            }
            GroundTransition::None => {}
        }

        if let Some(platform) = entered_platform {
            log::debug!("entered {platform} (blocked: {entry_was_blocked})");
            self.bus.publish(&MovingPlatformEntered {
                platform,
                contact_point: next.hit_point,
                entry_was_blocked,
            });
        }

        if transition != GroundTransition::None {
            self.bus.publish(&GroundedChanged {
                is_grounded: next.is_grounded,
                ground_normal: next.normal,
                ground_surface: next.surface,
            });
        }

        transition
    }

    fn probe(&self, world: &CollisionWorld, body: &CharacterBody, up: Vec3) -> GroundState {
        let radius = self.config.probe_radius;
        let (lift, reach) = if radius > 0.0 {
            (radius, self.config.probe_distance)
        } else {
            (RAY_LIFT, self.config.probe_distance + RAY_LIFT)
        };

        let hit = world.sphere_cast(
            body.position + up * lift,
            radius,
            -up,
            reach,
            ContentFlags::MASK_GROUND,
        );

        if !hit.hit_something() {
            return GroundState::airborne(body.position, up);
        }

        let surface = hit.hit_brush;
        GroundState {
            is_grounded: true,
            normal: hit.hit_normal.map_or(up, |n| n.normalize_or(up)),
            hit_point: hit.hit_point.unwrap_or(hit.end_position),
            surface,
            platform: surface.and_then(|brush| world.platform_of(brush)),
        }
    }

    /// Grace rule for a platform rising out from under the feet.
    fn within_platform_grace(
        &self,
        platforms: &dyn PlatformMotion,
        body: &CharacterBody,
        now: f64,
    ) -> bool {
        if self.config.platform_grounded_grace <= 0.0 {
            return false;
        }
        let Some(platform) = self.state.platform else {
            return false;
        };

        let rising = platforms
            .frame_delta(platform)
            .is_some_and(|delta| delta.y > RISING_EPSILON);
        let within_grace =
            now - self.last_grounded_time <= f64::from(self.config.platform_grounded_grace);
        let separation = (body.position.y - self.last_contact.hit_point.y).abs();

        rising && within_grace && separation <= self.config.platform_grounded_max_separation
    }
}
