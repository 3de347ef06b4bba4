//! The character's rigid body.
//!
//! A small kinematic body: gravity, a slide move through the collision world
//! and a push-out pass against brushes that moved into it. Velocity changes
//! from gameplay code arrive through [`CharacterBody::apply_velocity_change`].

mod slide_move;

pub use slide_move::{clip_velocity, slide_move, SlideOutcome};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::{CollisionWorld, ContentFlags, TraceShape};
use crate::error::{PhysicsError, PhysicsResult};

/// Physical parameters of the character body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Capsule radius (meters).
    pub radius: f32,

    /// Capsule height from feet to head (meters).
    pub height: f32,

    /// Gravity acceleration along world -Y (meters/second²).
    pub gravity: f32,

    /// Fall speed is clamped to this (meters/second).
    pub terminal_speed: f32,

    /// Slide move iterations per step.
    pub max_clip_planes: usize,

    /// Overbounce factor for velocity clipping (prevents sticking).
    pub overbounce: f32,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            radius: 0.35,
            height: 1.8,
            gravity: 9.81,
            terminal_speed: 50.0,
            max_clip_planes: 4,
            overbounce: 1.001,
        }
    }
}

impl BodyConfig {
    /// Clamp every field into its usable range.
    pub fn sanitized(&self) -> Self {
        let radius = self.radius.max(0.01);
        Self {
            radius,
            height: self.height.max(radius * 2.0),
            gravity: self.gravity.max(0.0),
            terminal_speed: self.terminal_speed.max(0.0),
            max_clip_planes: self.max_clip_planes.clamp(1, 5),
            overbounce: self.overbounce.max(1.0),
        }
    }

    /// Report the first unusable value.
    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.radius > 0.0) {
            return Err(PhysicsError::config("radius", "must be positive"));
        }
        if self.height < self.radius * 2.0 {
            return Err(PhysicsError::config("height", "must be at least twice the radius"));
        }
        if self.gravity < 0.0 {
            return Err(PhysicsError::config("gravity", "must not be negative"));
        }
        if self.overbounce < 1.0 {
            return Err(PhysicsError::config("overbounce", "must be at least 1"));
        }
        Ok(())
    }

    pub fn shape(&self) -> TraceShape {
        TraceShape::Capsule {
            radius: self.radius,
            height: self.height,
        }
    }
}

/// Position, facing and velocity of one character.
///
/// `position` is the bottom of the capsule. `rotation` is the facing (yaw
/// and any tilt applied by a snap); camera pitch lives on the integrator.
#[derive(Debug, Clone)]
pub struct CharacterBody {
    pub position: Vec3,
    pub rotation: Quat,
    velocity: Vec3,
    /// Gravity applies during [`step`](Self::step).
    pub use_gravity: bool,
    /// When false the body moves freely through geometry.
    pub detect_collisions: bool,
    config: BodyConfig,
}

impl CharacterBody {
    pub fn new(position: Vec3, config: BodyConfig) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            use_gravity: true,
            detect_collisions: true,
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &BodyConfig {
        &self.config
    }

    pub fn shape(&self) -> TraceShape {
        self.config.shape()
    }

    /// Local up axis.
    pub fn up(&self) -> Vec3 {
        (self.rotation * Vec3::Y).normalize_or_zero()
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Instantaneous velocity change (mass-independent impulse).
    pub fn apply_velocity_change(&mut self, delta: Vec3) {
        self.velocity += delta;
    }

    /// Hard override, used by snaps and rewinds.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Integrate one fixed step: gravity, then a slide move, then push-out.
    ///
    /// Without a world the body moves freely, as with collisions disabled.
    pub fn step(&mut self, world: Option<&CollisionWorld>, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        if self.use_gravity {
            self.velocity.y -= self.config.gravity * dt;
            self.velocity.y = self.velocity.y.max(-self.config.terminal_speed);
        }

        let world = match world {
            Some(world) if self.detect_collisions => world,
            _ => {
                self.position += self.velocity * dt;
                return;
            }
        };
        let shape = self.shape();

        // Platforms are teleported between steps and may overlap the body
        self.position = world.resolve_penetration(self.position, shape, ContentFlags::MASK_BODY);

        let outcome = slide_move(
            world,
            &mut self.position,
            &mut self.velocity,
            shape,
            ContentFlags::MASK_BODY,
            dt,
            self.config.max_clip_planes,
            self.config.overbounce,
        );

        if outcome.stuck {
            log::debug!("body stuck at {}, resolving penetration", self.position);
            self.position = world.resolve_penetration(self.position, shape, ContentFlags::MASK_BODY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.02;

    fn floor_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();
        world.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(50.0, 0.5, 50.0),
            ContentFlags::SOLID,
        );
        world
    }

    #[test]
    fn test_falls_and_rests_on_floor() {
        let world = floor_world();
        let mut body = CharacterBody::new(Vec3::new(0.0, 2.0, 0.0), BodyConfig::default());

        for _ in 0..100 {
            body.step(Some(&world), DT);
        }

        assert!(body.position.y.abs() < 0.01, "Should rest on the floor, y={}", body.position.y);
        assert!(body.velocity().y.abs() < 0.5);
    }

    #[test]
    fn test_fast_fall_does_not_tunnel() {
        let world = floor_world();
        let mut body = CharacterBody::new(Vec3::new(0.0, 2.0, 0.0), BodyConfig::default());
        body.set_velocity(Vec3::new(0.0, -40.0, 0.0));

        for _ in 0..20 {
            body.step(Some(&world), DT);
            assert!(body.position.y > -0.01, "Fell into the floor, y={}", body.position.y);
        }

        assert!(body.position.y < 0.01, "Should rest on the floor, y={}", body.position.y);
        assert!(!world.point_in_solid(body.position, body.shape(), ContentFlags::SOLID));
    }

    #[test]
    fn test_walks_on_flat_ground() {
        let world = floor_world();
        let mut body = CharacterBody::new(Vec3::ZERO, BodyConfig::default());
        for _ in 0..10 {
            body.step(Some(&world), DT);
        }

        for _ in 0..50 {
            let v = body.velocity();
            body.set_velocity(Vec3::new(0.0, v.y, -6.0));
            body.step(Some(&world), DT);
        }

        assert!((body.position.z + 6.0).abs() < 0.1, "z={}", body.position.z);
        assert!(body.position.y.abs() < 0.01, "Should stay on the floor, y={}", body.position.y);
    }

    #[test]
    fn test_without_world_moves_freely() {
        let mut body = CharacterBody::new(Vec3::new(0.0, 2.0, 0.0), BodyConfig::default());
        body.use_gravity = false;
        body.set_velocity(Vec3::new(1.0, -10.0, 0.0));

        body.step(None, 0.5);

        assert_eq!(body.position, Vec3::new(0.5, -3.0, 0.0));
    }

    #[test]
    fn test_no_gravity_keeps_height() {
        let world = floor_world();
        let mut body = CharacterBody::new(Vec3::new(0.0, 2.0, 0.0), BodyConfig::default());
        body.use_gravity = false;

        for _ in 0..10 {
            body.step(Some(&world), DT);
        }

        assert_eq!(body.position.y, 2.0);
    }

    #[test]
    fn test_collisions_disabled_passes_through() {
        let world = floor_world();
        let mut body = CharacterBody::new(Vec3::new(0.0, 0.5, 0.0), BodyConfig::default());
        body.detect_collisions = false;
        body.use_gravity = false;
        body.set_velocity(Vec3::new(0.0, -10.0, 0.0));

        body.step(Some(&world), 0.1);

        assert!(body.position.y < 0.0, "Should sink into the floor, y={}", body.position.y);
    }

    #[test]
    fn test_pushed_out_by_rising_brush() {
        let mut world = floor_world();
        let lift = world.add_box(Vec3::new(5.0, -0.25, 0.0), Vec3::new(1.0, 0.25, 1.0), ContentFlags::SOLID);
        let mut body = CharacterBody::new(Vec3::new(5.0, 0.0, 0.0), BodyConfig::default());
        body.use_gravity = false;

        world.set_brush_center(lift, Vec3::new(5.0, 0.0, 0.0));
        body.step(Some(&world), DT);

        assert!((body.position.y - 0.25).abs() < 0.01, "y={}", body.position.y);
    }

    #[test]
    fn test_config_validation() {
        assert!(BodyConfig::default().validate().is_ok());

        let bad = BodyConfig {
            radius: 0.5,
            height: 0.6,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(PhysicsError::InvalidConfiguration { field: "height", .. })
        ));
        assert!(bad.sanitized().validate().is_ok());
    }
}
