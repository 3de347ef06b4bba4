//! Undo the last jump.
//!
//! The character is snapped back to where its most recent jump started,
//! nudged against the jump velocity until there is ground below it. Physics
//! and input stay off until the snap completes.

use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::body::CharacterBody;
use crate::collision::{CollisionWorld, ContentFlags};
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::{EventBus, SnapCompleted, UndoBegan, UndoCompleted};
use crate::movement::{LocomotionStateMachine, MovementState, VelocityIntegrator};
use crate::time::Tick;

use super::history::{HistoryConfig, JumpHistory};

/// Height above a candidate the ground ray starts from.
const GROUND_RAY_LIFT: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewindConfig {
    /// Duration of the return snap (seconds).
    pub snap_time: f32,
    /// Lift added along body-up to the final target (meters).
    pub post_snap_up_offset: f32,
    /// Scale of the nudge against the recorded jump velocity.
    pub nudge_multiplier: f32,
    /// How far below a candidate ground must be found (meters).
    pub ground_check_distance: f32,
    /// Ground probes before the last candidate is accepted anyway (1..=3).
    pub max_nudge_attempts: u32,
    /// Restore the facing recorded with the jump.
    pub rotate_to_target: bool,
    pub history: HistoryConfig,
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            snap_time: 0.25,
            post_snap_up_offset: 0.05,
            nudge_multiplier: 1.2,
            ground_check_distance: 1.2,
            max_nudge_attempts: 3,
            rotate_to_target: true,
            history: HistoryConfig::default(),
        }
    }
}

impl RewindConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            snap_time: self.snap_time.max(0.0),
            post_snap_up_offset: self.post_snap_up_offset.max(0.0),
            nudge_multiplier: self.nudge_multiplier,
            ground_check_distance: self.ground_check_distance.max(0.0),
            max_nudge_attempts: self.max_nudge_attempts.clamp(1, 3),
            rotate_to_target: self.rotate_to_target,
            history: HistoryConfig {
                merge_window: self.history.merge_window.max(0.0),
                min_time_after_landing: self.history.min_time_after_landing.max(0.0),
                capacity: self.history.capacity,
            },
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if !(1..=3).contains(&self.max_nudge_attempts) {
            return Err(PhysicsError::config("max_nudge_attempts", "must be within 1..=3"));
        }
        if !(self.snap_time >= 0.0) {
            return Err(PhysicsError::config("snap_time", "must not be negative"));
        }
        if !(self.ground_check_distance >= 0.0) {
            return Err(PhysicsError::config("ground_check_distance", "must not be negative"));
        }
        Ok(())
    }
}

/// The parts of a character an undo drives.
pub struct RewindParts<'a> {
    pub world: Option<&'a CollisionWorld>,
    pub body: &'a mut CharacterBody,
    pub integrator: &'a mut VelocityIntegrator,
    pub machine: &'a mut LocomotionStateMachine,
    pub history: &'a JumpHistory,
}

#[derive(Debug)]
pub struct RewindController {
    config: RewindConfig,
    bus: Arc<EventBus>,
    in_progress: bool,
    cached_detect_collisions: bool,
    warned_missing_world: bool,
}

impl RewindController {
    pub fn new(config: RewindConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config: config.sanitized(),
            bus,
            in_progress: false,
            cached_detect_collisions: true,
            warned_missing_world: false,
        }
    }

    pub fn config(&self) -> &RewindConfig {
        &self.config
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// Start snapping back to the last recorded jump.
    ///
    /// Returns false without side effects when an undo is already running or
    /// there is nothing to undo.
    pub fn begin_undo(&mut self, parts: RewindParts<'_>, tick: Tick) -> bool {
        if self.in_progress || parts.history.is_empty() {
            return false;
        }

        parts.history.pause();
        self.cached_detect_collisions = parts.body.detect_collisions;
        parts.body.detect_collisions = false;
        parts.body.set_velocity(Vec3::ZERO);
        parts.integrator.set_external_input_allowed(false);

        let Some(snapshot) = parts.history.pop() else {
            self.restore(parts.body, parts.integrator, parts.history);
            return false;
        };

        self.in_progress = true;
        parts
            .machine
            .temporarily_set_state(MovementState::Cutscene, self.config.snap_time, tick.now);

        let nudge = -snapshot.velocity * tick.dt * self.config.nudge_multiplier;
        let mut target = self.resolve_target(parts.world, snapshot.position + nudge, nudge);
        if self.config.post_snap_up_offset > 0.0 {
            target += parts.body.up() * self.config.post_snap_up_offset;
        }

        log::debug!(
            "undo jump from {:.3}: {} -> {target}",
            snapshot.timestamp,
            parts.body.position
        );
        self.bus.publish(&UndoBegan {
            snapshot,
            snap_time: self.config.snap_time,
        });

        let rotation = self.config.rotate_to_target.then_some(snapshot.rotation);
        parts
            .integrator
            .snap_to(parts.body, target, self.config.snap_time, rotation);
        true
    }

    /// Per-step hold: the body does not move on its own during an undo.
    pub fn tick(&self, body: &mut CharacterBody) {
        if self.in_progress {
            body.set_velocity(Vec3::ZERO);
        }
    }

    /// Finish the undo when its snap completes. Returns true if it did.
    pub fn on_snap_completed(
        &mut self,
        _completed: &SnapCompleted,
        parts: RewindParts<'_>,
        now: f64,
    ) -> bool {
        if !self.in_progress {
            return false;
        }

        self.restore(parts.body, parts.integrator, parts.history);
        parts.machine.end_temporary_state(now);
        self.in_progress = false;
        self.bus.publish(&UndoCompleted { time: now });
        true
    }

    fn restore(
        &self,
        body: &mut CharacterBody,
        integrator: &mut VelocityIntegrator,
        history: &JumpHistory,
    ) {
        body.detect_collisions = self.cached_detect_collisions;
        integrator.set_external_input_allowed(true);
        history.resume();
    }

    /// Walk from `candidate` along `nudge` until there is ground below.
    /// The last candidate is accepted when every probe misses.
    fn resolve_target(&mut self, world: Option<&CollisionWorld>, candidate: Vec3, nudge: Vec3) -> Vec3 {
        let Some(world) = world else {
            if !self.warned_missing_world {
                let err = PhysicsError::MissingCollaborator("collision world");
                log::warn!("rewind: {err}; skipping ground check");
                self.warned_missing_world = true;
            }
            return candidate;
        };

        let mut candidate = candidate;
        for attempt in 0..self.config.max_nudge_attempts {
            let hit = world.raycast(
                candidate + Vec3::Y * GROUND_RAY_LIFT,
                Vec3::NEG_Y,
                self.config.ground_check_distance + GROUND_RAY_LIFT,
                ContentFlags::MASK_GROUND,
            );
            if hit.hit_something() {
                return candidate;
            }
            log::debug!("no ground below undo target (attempt {})", attempt + 1);
            candidate += nudge;
        }
        candidate
    }
}
