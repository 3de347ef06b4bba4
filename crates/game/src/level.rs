//! Level construction.

use std::sync::Arc;

use glam::Vec3;
use hopper_physics::collision::BrushId;
use hopper_physics::{
    CollisionWorld, ContentFlags, EventBus, JumpPadConfig, JumpPadSet, PlatformConfig, PlatformId,
    PlatformSet, SurfaceProperties,
};
use serde::{Deserialize, Serialize};

/// A level: static geometry, moving platforms and jump pads.
#[derive(Debug)]
pub struct Level {
    /// Level identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Collision world for physics.
    pub collision: CollisionWorld,

    pub platforms: PlatformSet,

    pub jump_pads: JumpPadSet,

    pub spawn: SpawnPoint,
}

/// Where the character starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Position in world space (feet).
    pub position: Vec3,

    /// Initial look yaw (degrees).
    pub yaw: f32,
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
        }
    }
}

impl Level {
    /// Create an empty level.
    pub fn new(id: &str, name: &str, bus: Arc<EventBus>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            collision: CollisionWorld::new(),
            platforms: PlatformSet::new(bus.clone()),
            jump_pads: JumpPadSet::new(bus),
            spawn: SpawnPoint::default(),
        }
    }

    /// Add a solid box.
    pub fn add_block(&mut self, center: Vec3, half_extents: Vec3) -> BrushId {
        self.collision
            .add_box(center, half_extents, ContentFlags::SOLID)
    }

    /// Add a solid box with its own traction and damping.
    pub fn add_surface(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        surface: SurfaceProperties,
    ) -> BrushId {
        let brush = self.add_block(center, half_extents);
        self.collision.set_surface(brush, surface);
        brush
    }

    /// Add a slab that travels between `waypoints`. The slab starts on the
    /// first present waypoint.
    pub fn add_moving_platform(
        &mut self,
        waypoints: Vec<Option<Vec3>>,
        half_extents: Vec3,
        config: PlatformConfig,
    ) -> PlatformId {
        let start = waypoints.iter().flatten().next().copied().unwrap_or(Vec3::ZERO);
        let brush = self.add_block(start, half_extents);
        self.platforms
            .add_with_brushes(&mut self.collision, waypoints, config, &[brush])
    }

    pub fn add_jump_pad(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        config: JumpPadConfig,
    ) -> BrushId {
        self.jump_pads
            .add(&mut self.collision, center, half_extents, config)
    }

    /// A small course exercising every mechanic: a floor, an ice patch, a
    /// ledge, a lift and a jump pad onto a high platform.
    pub fn test_course(bus: Arc<EventBus>) -> Self {
        let mut level = Self::new("test_course", "Test Course", bus);

        // Ice patch, flush with the floor. Coplanar contacts resolve to the
        // earlier brush, so it goes in first.
        level.add_surface(
            Vec3::new(10.0, -0.05, 0.0),
            Vec3::new(4.0, 0.05, 4.0),
            SurfaceProperties::ICE,
        );

        // Floor
        level.add_block(Vec3::new(0.0, -0.5, 0.0), Vec3::new(30.0, 0.5, 30.0));

        // Ledge
        level.add_block(Vec3::new(-10.0, 0.5, 0.0), Vec3::new(3.0, 0.5, 3.0));

        // Lift between the floor and the high platform
        level.add_moving_platform(
            vec![Some(Vec3::new(0.0, -0.25, 12.0)), Some(Vec3::new(0.0, 4.75, 12.0))],
            Vec3::new(1.5, 0.25, 1.5),
            PlatformConfig {
                travel_time: 3.0,
                idle_time: 1.0,
                ..Default::default()
            },
        );

        // High platform and the pad that reaches it
        level.add_block(Vec3::new(0.0, 4.5, 20.0), Vec3::new(3.0, 0.5, 3.0));
        level.add_jump_pad(
            Vec3::new(-5.0, 0.05, 20.0),
            Vec3::new(0.75, 0.05, 0.75),
            JumpPadConfig {
                boost_force: 10.5,
                direction: Vec3::new(0.2, 1.0, 0.0),
                landing_target: Some(Vec3::new(-2.0, 6.0, 20.0)),
                ..Default::default()
            },
        );

        level.spawn = SpawnPoint {
            position: Vec3::ZERO,
            yaw: 0.0,
        };
        level
    }
}
