//! Moving platforms.
//!
//! A platform is a [`PlatformScrubber`] walking a list of waypoints plus any
//! number of collision brushes linked to it. [`PlatformSet`] owns them all,
//! steps them with a signed delta and carries the linked brushes along.

mod scrubber;

pub use scrubber::{PlatformConfig, PlatformSaveState, PlatformScrubber, PlatformTraversalState};

use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::collision::{BrushId, CollisionWorld};
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::EventBus;

/// Handle to a platform inside a [`PlatformSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformId(pub u32);

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform#{}", self.0)
    }
}

/// Read access to how platforms moved during the last step.
pub trait PlatformMotion {
    /// Displacement of `platform` during the last step, if it exists.
    fn frame_delta(&self, platform: PlatformId) -> Option<Vec3>;

    /// Velocity implied by the last frame delta.
    fn platform_velocity(&self, platform: PlatformId, dt: f32) -> Option<Vec3> {
        if dt <= 0.0 {
            return Some(Vec3::ZERO);
        }
        self.frame_delta(platform).map(|delta| delta / dt)
    }
}

/// No platforms at all.
impl PlatformMotion for () {
    fn frame_delta(&self, _platform: PlatformId) -> Option<Vec3> {
        None
    }
}

/// Every platform in a level.
#[derive(Debug)]
pub struct PlatformSet {
    platforms: Vec<PlatformScrubber>,
    bus: Arc<EventBus>,
}

impl PlatformSet {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            platforms: Vec::new(),
            bus,
        }
    }

    /// Create a platform and return its handle.
    pub fn add(&mut self, waypoints: Vec<Option<Vec3>>, config: PlatformConfig) -> PlatformId {
        let id = PlatformId(self.platforms.len() as u32);
        self.platforms
            .push(PlatformScrubber::new(id, waypoints, config, self.bus.clone()));
        id
    }

    /// Create a platform and link `brushes` to it so they ride along.
    pub fn add_with_brushes(
        &mut self,
        world: &mut CollisionWorld,
        waypoints: Vec<Option<Vec3>>,
        config: PlatformConfig,
        brushes: &[BrushId],
    ) -> PlatformId {
        let id = self.add(waypoints, config);
        for &brush in brushes {
            if !world.link_platform(brush, id) {
                log::warn!("cannot link unknown {brush} to {id}");
            }
        }
        id
    }

    pub fn get(&self, id: PlatformId) -> Option<&PlatformScrubber> {
        self.platforms.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: PlatformId) -> Option<&mut PlatformScrubber> {
        self.platforms.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformScrubber> {
        self.platforms.iter()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Step every platform by `dt` (negative runs time backwards) and move
    /// the brushes linked to it by the same displacement.
    pub fn step(&mut self, mut world: Option<&mut CollisionWorld>, dt: f32) {
        for platform in &mut self.platforms {
            let delta = platform.fixed_step(dt);
            if delta == Vec3::ZERO {
                continue;
            }
            if let Some(world) = world.as_deref_mut() {
                carry_brushes(world, platform.id(), delta);
            }
        }
    }

    pub fn capture_save_states(&self) -> Vec<PlatformSaveState> {
        self.platforms
            .iter()
            .map(PlatformScrubber::capture_save_state)
            .collect()
    }

    /// Restore every entry onto its platform and move linked brushes to match.
    ///
    /// Entries are applied one by one. The first invalid entry stops the
    /// restore and is reported; platforms it did not reach are untouched.
    pub fn restore_save_states(
        &mut self,
        mut world: Option<&mut CollisionWorld>,
        states: &[PlatformSaveState],
    ) -> PhysicsResult<()> {
        for state in states {
            let platform = self.get_mut(state.platform).ok_or_else(|| {
                PhysicsError::InvalidSaveState(format!("unknown {}", state.platform))
            })?;

            let before = platform.position();
            platform.restore_save_state(state)?;
            let delta = platform.position() - before;

            if let Some(world) = world.as_deref_mut() {
                carry_brushes(world, state.platform, delta);
            }
        }
        Ok(())
    }
}

impl PlatformMotion for PlatformSet {
    fn frame_delta(&self, platform: PlatformId) -> Option<Vec3> {
        self.get(platform).map(PlatformScrubber::frame_delta)
    }
}

fn carry_brushes(world: &mut CollisionWorld, platform: PlatformId, delta: Vec3) {
    let moved: Vec<(BrushId, Vec3)> = world
        .brushes_linked_to(platform)
        .map(|brush| (brush.id, brush.center() + delta))
        .collect();

    for (brush, center) in moved {
        world.set_brush_center(brush, center);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::ContentFlags;
    use crate::easing::EasingCurve;

    fn linear(travel_time: f32) -> PlatformConfig {
        PlatformConfig {
            travel_time,
            idle_time: 0.0,
            curve: EasingCurve::Linear,
            ping_pong: true,
        }
    }

    #[test]
    fn test_step_carries_linked_brushes() {
        let bus = Arc::new(EventBus::new());
        let mut world = CollisionWorld::new();
        let deck = world.add_box(Vec3::ZERO, Vec3::new(1.0, 0.1, 1.0), ContentFlags::SOLID);

        let mut platforms = PlatformSet::new(bus);
        let id = platforms.add_with_brushes(
            &mut world,
            vec![Some(Vec3::ZERO), Some(Vec3::new(4.0, 0.0, 0.0))],
            linear(1.0),
            &[deck],
        );

        platforms.step(Some(&mut world), 0.5);

        let center = world.brush(deck).map(|brush| brush.center()).unwrap_or_default();
        assert!((center.x - 2.0).abs() < 1e-4, "Brush should ride along, x={}", center.x);
        assert!((platforms.frame_delta(id).unwrap_or_default().x - 2.0).abs() < 1e-4);
        assert!((platforms.platform_velocity(id, 0.5).unwrap_or_default().x - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_restore_moves_brushes_back() {
        let bus = Arc::new(EventBus::new());
        let mut world = CollisionWorld::new();
        let deck = world.add_box(Vec3::ZERO, Vec3::new(1.0, 0.1, 1.0), ContentFlags::SOLID);
        let mut platforms = PlatformSet::new(bus);
        platforms.add_with_brushes(
            &mut world,
            vec![Some(Vec3::ZERO), Some(Vec3::new(0.0, 4.0, 0.0))],
            linear(2.0),
            &[deck],
        );

        let saved = platforms.capture_save_states();
        platforms.step(Some(&mut world), 1.0);
        platforms
            .restore_save_states(Some(&mut world), &saved)
            .expect("restore should succeed");

        let center = world.brush(deck).map(|brush| brush.center()).unwrap_or_default();
        assert!(center.y.abs() < 1e-4, "y={}", center.y);
    }

    #[test]
    fn test_restore_unknown_platform_fails() {
        let bus = Arc::new(EventBus::new());
        let mut platforms = PlatformSet::new(bus.clone());
        platforms.add(vec![Some(Vec3::ZERO), Some(Vec3::X)], linear(1.0));

        let mut other = PlatformSet::new(bus);
        other.add(vec![Some(Vec3::ZERO), Some(Vec3::X)], linear(1.0));
        other.add(vec![Some(Vec3::ZERO), Some(Vec3::X)], linear(1.0));

        let result = platforms.restore_save_states(None, &other.capture_save_states());
        assert!(matches!(result, Err(PhysicsError::InvalidSaveState(_))));
    }

    #[test]
    fn test_unit_motion_has_no_platforms() {
        assert_eq!(().frame_delta(PlatformId(0)), None);
        assert_eq!(().platform_velocity(PlatformId(0), 0.02), None);
    }
}
