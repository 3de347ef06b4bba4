//! Velocity integration.
//!
//! Every velocity change from gameplay code (locomotion, jumps, dashes, jump
//! pads, platform co-motion) is queued here and applied to the body exactly
//! once per fixed step as a single instantaneous change.
//!
//! The integrator also owns look yaw/pitch, the input permission flags and
//! the snap primitive used by rewinds and scripted teleports.

use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};

use crate::body::CharacterBody;
use crate::events::{EventBus, SnapCompleted};
use crate::surface::{SurfaceProperties, TractionSample};
use crate::time::Tick;

use super::config::MovementConfig;
use super::state::{LocomotionStateMachine, MovementState};

/// Squared lengths below this count as zero.
const EPSILON_SQ: f32 = 1e-8;

/// What the character stands on this step, as seen by the integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Support {
    pub grounded: bool,
    /// Ground normal, or the body's up axis in the air.
    pub normal: Vec3,
    /// Properties of the contacted surface. Ignored in the air.
    pub surface: SurfaceProperties,
    /// Velocity of the platform underfoot, if standing on one.
    pub platform_velocity: Option<Vec3>,
    /// The platform was only just entered; its velocity must not be inherited yet.
    pub platform_effect_blocked: bool,
}

impl Support {
    pub fn airborne(up: Vec3) -> Self {
        Self {
            grounded: false,
            normal: up,
            surface: SurfaceProperties::NORMAL,
            platform_velocity: None,
            platform_effect_blocked: false,
        }
    }
}

/// An in-flight snap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SnapMotion {
    start_position: Vec3,
    target_position: Vec3,
    start_rotation: Quat,
    target_rotation: Option<Quat>,
    elapsed: f32,
    duration: f32,
    /// This snap locked input and must release it.
    took_input_lock: bool,
}

#[derive(Debug)]
pub struct VelocityIntegrator {
    config: MovementConfig,
    bus: Arc<EventBus>,

    queued: Vec3,
    traction: TractionSample,
    /// Platform velocity already folded into the body's velocity.
    carried_platform_velocity: Vec3,
    gravity_enabled: bool,

    move_input: Vec2,
    look_yaw: f32,
    look_pitch: f32,

    external_input_allowed: bool,
    snap_input_locked: bool,
    snap: Option<SnapMotion>,
}

impl VelocityIntegrator {
    pub fn new(config: MovementConfig, bus: Arc<EventBus>) -> Self {
        let config = config.sanitized();
        Self {
            traction: TractionSample::from(config.default_surface),
            config,
            bus,
            queued: Vec3::ZERO,
            carried_platform_velocity: Vec3::ZERO,
            gravity_enabled: true,
            move_input: Vec2::ZERO,
            look_yaw: 0.0,
            look_pitch: 0.0,
            external_input_allowed: true,
            snap_input_locked: false,
            snap: None,
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn traction(&self) -> TractionSample {
        self.traction
    }

    pub fn carried_platform_velocity(&self) -> Vec3 {
        self.carried_platform_velocity
    }

    /// Gravity setting restored whenever a dash is not suspending it.
    pub fn set_gravity_enabled(&mut self, enabled: bool) {
        self.gravity_enabled = enabled;
    }

    // ========================================================================
    // Queued velocity changes
    // ========================================================================

    /// Add a velocity change to be applied at the end of this step.
    pub fn queue_velocity_change(&mut self, delta: Vec3) {
        if delta.length_squared() > EPSILON_SQ {
            self.queued += delta;
        }
    }

    pub fn queued_velocity_change(&self) -> Vec3 {
        self.queued
    }

    /// Velocity the body will have once the queue is applied.
    pub fn pending_velocity(&self, body: &CharacterBody) -> Vec3 {
        body.velocity() + self.queued
    }

    /// Apply and clear the queue. Returns the applied change; calling it
    /// again before anything new is queued applies nothing.
    pub fn apply_queued(&mut self, body: &mut CharacterBody) -> Vec3 {
        let delta = std::mem::take(&mut self.queued);
        if delta != Vec3::ZERO {
            body.apply_velocity_change(delta);
        }
        delta
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn set_external_input_allowed(&mut self, allowed: bool) {
        self.external_input_allowed = allowed;
        if !allowed {
            self.move_input = Vec2::ZERO;
        }
    }

    pub fn external_input_allowed(&self) -> bool {
        self.external_input_allowed
    }

    pub fn is_snap_input_locked(&self) -> bool {
        self.snap_input_locked
    }

    pub fn is_look_input_allowed(&self) -> bool {
        self.external_input_allowed && !self.snap_input_locked
    }

    pub fn is_movement_input_allowed(&self, state: MovementState) -> bool {
        self.is_look_input_allowed() && state != MovementState::Cutscene
    }

    /// Latest move stick value. Dropped while movement input is not allowed.
    pub fn set_move_input(&mut self, input: Vec2, state: MovementState) {
        self.move_input = if self.is_movement_input_allowed(state) {
            input
        } else {
            Vec2::ZERO
        };
    }

    pub fn move_input(&self) -> Vec2 {
        self.move_input
    }

    /// Look yaw in degrees, wrapped to (-180, 180].
    pub fn look_yaw(&self) -> f32 {
        self.look_yaw
    }

    /// Look pitch in degrees, positive looking down.
    pub fn look_pitch(&self) -> f32 {
        self.look_pitch
    }

    /// Rotate the view by a raw look delta. Ignored while look input is locked.
    pub fn apply_look(&mut self, body: &mut CharacterBody, input: Vec2) {
        if !self.is_look_input_allowed() || input.length_squared() <= 0.0 {
            return;
        }

        let half_range = self.config.max_look_pitch_deg * 0.5;
        self.look_pitch =
            (self.look_pitch - input.y * self.config.look_sensitivity).clamp(-half_range, half_range);
        self.look_yaw = wrap_degrees(self.look_yaw + input.x * self.config.look_sensitivity);

        if self.config.lock_forward_to_look {
            body.rotation = yaw_rotation(self.look_yaw);
        }
    }

    /// Take look yaw from a facing rotation.
    pub fn sync_look_to(&mut self, rotation: Quat) {
        let forward = rotation * Vec3::NEG_Z;
        if forward.x.abs() + forward.z.abs() > 1e-4 {
            self.look_yaw = wrap_degrees(forward.x.atan2(-forward.z).to_degrees());
        }
    }

    /// Camera-relative stick input in world space, clamped to unit length.
    pub fn input_to_world(&self, input: Vec2) -> Vec3 {
        let forward = yaw_rotation(self.look_yaw) * Vec3::NEG_Z;
        let right = forward.cross(Vec3::Y);
        (forward * input.y + right * input.x).clamp_length_max(1.0)
    }

    // ========================================================================
    // Per-step integration
    // ========================================================================

    /// One fixed step of locomotion. Queues the step's own deltas on top of
    /// anything queued earlier in the tick, then applies the lot.
    pub fn fixed_step(
        &mut self,
        body: &mut CharacterBody,
        machine: &mut LocomotionStateMachine,
        support: &Support,
        tick: Tick,
    ) {
        let dt = tick.dt;
        let state = machine.state();

        body.use_gravity = self.gravity_enabled
            && self.snap.is_none()
            && !(self.config.ignore_gravity_during_dash && state == MovementState::Dashing);

        if self.snap.is_some() {
            self.queued = Vec3::ZERO;
            return;
        }

        if !support.grounded && state == MovementState::Default {
            machine.set_state(MovementState::Airborne, 0.0, tick.now);
        }

        let target = if support.grounded {
            support.surface
        } else {
            self.config.default_surface
        };
        self.traction
            .step_towards(target, self.config.traction_rate, self.config.damping_rate, dt);

        let platform_velocity = match support.platform_velocity {
            Some(velocity) if self.config.move_with_platform && support.grounded => velocity,
            _ => Vec3::ZERO,
        };
        // The body already carries last step's platform velocity
        if !support.platform_effect_blocked {
            self.queue_velocity_change(platform_velocity - self.carried_platform_velocity);
        }
        self.carried_platform_velocity = platform_velocity;

        let normal = support.normal.normalize_or(body.up());
        let velocity = self.pending_velocity(body);
        let lateral = project_on_plane(velocity, normal);
        let lateral_without_platform = lateral - project_on_plane(platform_velocity, normal);

        let intent = if self.is_movement_input_allowed(machine.state()) {
            project_on_plane(self.input_to_world(self.move_input), normal).normalize_or_zero()
        } else {
            Vec3::ZERO
        };

        if intent != Vec3::ZERO {
            let desired = intent * self.config.max_speed;
            let delta = desired - lateral_without_platform;

            let mut traction = self.traction.traction;
            if !support.grounded {
                traction *= self.config.air_control;
            }

            let parallel = intent * delta.dot(intent);
            let perpendicular = delta - parallel;
            self.queue_velocity_change(
                parallel.clamp_length_max(self.config.acceleration * traction * dt)
                    + perpendicular.clamp_length_max(self.config.turn_acceleration * traction * dt),
            );
        } else if support.grounded {
            let limit = self.config.damping * self.traction.damping * dt;
            self.queue_velocity_change(-lateral_without_platform.clamp_length_max(limit));
        }

        self.apply_queued(body);
    }

    // ========================================================================
    // Snap
    // ========================================================================

    pub fn is_snapping(&self) -> bool {
        self.snap.is_some()
    }

    /// Move the body to `target` over `duration` seconds, optionally turning
    /// it to `rotation`. Zero uses the configured default duration.
    ///
    /// A snap already in progress is cancelled and its input lock released.
    pub fn snap_to(
        &mut self,
        body: &mut CharacterBody,
        target: Vec3,
        duration: f32,
        rotation: Option<Quat>,
    ) {
        let took_input_lock = self.external_input_allowed;
        if let Some(previous) = self.snap.take() {
            log::debug!("snap to {} replaced by snap to {target}", previous.target_position);
            if previous.took_input_lock {
                self.snap_input_locked = false;
            }
        }
        if took_input_lock {
            self.snap_input_locked = true;
        }

        self.move_input = Vec2::ZERO;
        self.queued = Vec3::ZERO;
        body.set_velocity(Vec3::ZERO);

        let requested = if duration > 0.0 {
            duration
        } else {
            self.config.snap_duration
        };
        let duration = requested.max(0.001).min(self.config.snap_max_duration);

        self.snap = Some(SnapMotion {
            start_position: body.position,
            target_position: target,
            start_rotation: body.rotation,
            target_rotation: rotation.map(Quat::normalize),
            elapsed: 0.0,
            duration,
            took_input_lock,
        });
    }

    /// Advance the snap in progress, if any. Returns the completion when
    /// the snap finishes this step.
    pub fn tick_snap(&mut self, body: &mut CharacterBody, dt: f32) -> Option<SnapCompleted> {
        let mut snap = self.snap?;

        let position_reached = body.position.distance_squared(snap.target_position)
            <= self.config.snap_completion_distance * self.config.snap_completion_distance;
        let rotation_reached = snap.target_rotation.map_or(true, |target| {
            body.rotation.angle_between(target).to_degrees() <= self.config.snap_completion_angle_deg
        });

        body.set_velocity(Vec3::ZERO);

        if snap.elapsed < snap.duration && !(position_reached && rotation_reached) {
            snap.elapsed += dt.max(0.0);
            let t = self.config.snap_curve.evaluate(snap.elapsed / snap.duration);
            body.position = snap.start_position.lerp(snap.target_position, t);
            if let Some(target) = snap.target_rotation {
                body.rotation = snap.start_rotation.slerp(target, t);
            }
            self.snap = Some(snap);

            if snap.elapsed < snap.duration {
                return None;
            }
        }

        Some(self.complete_snap(body, snap))
    }

    fn complete_snap(&mut self, body: &mut CharacterBody, snap: SnapMotion) -> SnapCompleted {
        body.position = snap.target_position;
        if let Some(target) = snap.target_rotation {
            body.rotation = target;
            self.sync_look_to(target);
        }
        body.set_velocity(Vec3::ZERO);

        if snap.took_input_lock {
            self.snap_input_locked = false;
        }
        self.snap = None;

        let completed = SnapCompleted {
            position: snap.target_position,
        };
        self.bus.publish(&completed);
        completed
    }
}

fn project_on_plane(vector: Vec3, normal: Vec3) -> Vec3 {
    vector - normal * vector.dot(normal)
}

fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Facing for a yaw in degrees; positive yaw turns right.
fn yaw_rotation(yaw_deg: f32) -> Quat {
    Quat::from_rotation_y(-yaw_deg.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyConfig;

    const DT: f32 = 0.02;

    fn integrator() -> VelocityIntegrator {
        VelocityIntegrator::new(MovementConfig::default(), Arc::new(EventBus::new()))
    }

    fn body() -> CharacterBody {
        let mut body = CharacterBody::new(Vec3::ZERO, BodyConfig::default());
        body.use_gravity = false;
        body
    }

    fn ground() -> Support {
        Support {
            grounded: true,
            normal: Vec3::Y,
            surface: SurfaceProperties::NORMAL,
            platform_velocity: None,
            platform_effect_blocked: false,
        }
    }

    #[test]
    fn test_apply_queued_is_idempotent() {
        let mut integrator = integrator();
        let mut body = body();

        integrator.queue_velocity_change(Vec3::new(1.0, 0.0, 0.0));
        integrator.queue_velocity_change(Vec3::new(0.0, 2.0, 0.0));

        assert_eq!(integrator.apply_queued(&mut body), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(integrator.apply_queued(&mut body), Vec3::ZERO, "Second apply must be a no-op");
        assert_eq!(body.velocity(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_accelerates_toward_input() {
        let mut integrator = integrator();
        let mut machine = LocomotionStateMachine::new();
        let mut body = body();
        integrator.set_move_input(Vec2::new(0.0, 1.0), machine.state());

        integrator.fixed_step(&mut body, &mut machine, &ground(), Tick::new(0.0, DT));

        let expected = integrator.config().acceleration * DT;
        assert!((body.velocity().length() - expected).abs() < 1e-4, "v={}", body.velocity());
        assert!(body.velocity().z < 0.0, "Forward is -Z at yaw 0");

        for step in 1..200 {
            integrator.fixed_step(&mut body, &mut machine, &ground(), Tick::new(f64::from(step) * 0.02, DT));
        }
        assert!((body.velocity().length() - 6.0).abs() < 1e-3, "Should settle at max speed");
    }

    #[test]
    fn test_braking_is_monotonic() {
        let mut integrator = integrator();
        let mut machine = LocomotionStateMachine::new();
        let mut body = body();
        body.set_velocity(Vec3::new(5.0, 0.0, 0.0));

        let mut previous = body.velocity().x;
        for step in 0..100 {
            integrator.fixed_step(&mut body, &mut machine, &ground(), Tick::new(f64::from(step) * 0.02, DT));
            let speed = body.velocity().x;
            assert!(speed >= 0.0, "Braking must not reverse, vx={speed}");
            assert!(speed <= previous, "Braking must not speed up");
            previous = speed;
        }
        assert!(body.velocity().x.abs() < 1e-3, "Should come to rest, vx={}", body.velocity().x);
    }

    #[test]
    fn test_no_braking_in_air() {
        let mut integrator = integrator();
        let mut machine = LocomotionStateMachine::new();
        let mut body = body();
        body.set_velocity(Vec3::new(5.0, 0.0, 0.0));

        integrator.fixed_step(&mut body, &mut machine, &Support::airborne(Vec3::Y), Tick::new(0.0, DT));

        assert_eq!(body.velocity().x, 5.0);
        assert_eq!(machine.state(), MovementState::Airborne, "Ungrounded Default becomes Airborne");
    }

    #[test]
    fn test_ice_slows_down_braking() {
        let mut integrator = integrator();
        let mut machine = LocomotionStateMachine::new();
        let mut body = body();
        body.set_velocity(Vec3::new(5.0, 0.0, 0.0));
        let ice = Support {
            surface: SurfaceProperties::ICE,
            ..ground()
        };

        for step in 0..10 {
            integrator.fixed_step(&mut body, &mut machine, &ice, Tick::new(f64::from(step) * 0.02, DT));
        }

        assert!(integrator.traction().damping < 0.5, "Damping should ease toward ice");
        assert!(body.velocity().x > 3.5, "vx={}", body.velocity().x);
    }

    #[test]
    fn test_platform_velocity_inherited_once_unblocked() {
        let mut integrator = integrator();
        let mut machine = LocomotionStateMachine::new();
        let mut body = body();
        let platform = Vec3::new(2.0, 0.0, 0.0);

        let blocked = Support {
            platform_velocity: Some(platform),
            platform_effect_blocked: true,
            ..ground()
        };
        integrator.fixed_step(&mut body, &mut machine, &blocked, Tick::new(0.0, DT));
        assert_eq!(integrator.carried_platform_velocity(), platform);

        // Platform speeds up: only the change is inherited
        let riding = Support {
            platform_velocity: Some(Vec3::new(3.0, 0.0, 0.0)),
            platform_effect_blocked: false,
            ..ground()
        };
        let before = body.velocity().x;
        integrator.fixed_step(&mut body, &mut machine, &riding, Tick::new(0.02, DT));
        let gained = body.velocity().x - before;
        assert!(gained > 0.9, "Should inherit the platform acceleration, gained {gained}");

        integrator.fixed_step(&mut body, &mut machine, &Support::airborne(Vec3::Y), Tick::new(0.04, DT));
        assert_eq!(integrator.carried_platform_velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_dash_suspends_gravity() {
        let mut integrator = integrator();
        let mut machine = LocomotionStateMachine::new();
        let mut body = body();
        machine.temporarily_set_state(MovementState::Dashing, 0.25, 0.0);

        integrator.fixed_step(&mut body, &mut machine, &ground(), Tick::new(0.0, DT));
        assert!(!body.use_gravity);

        machine.tick(0.3);
        integrator.fixed_step(&mut body, &mut machine, &ground(), Tick::new(0.3, DT));
        assert!(body.use_gravity);
    }

    #[test]
    fn test_cutscene_blocks_movement_not_look() {
        let mut integrator = integrator();
        let mut body = body();

        assert!(!integrator.is_movement_input_allowed(MovementState::Cutscene));
        integrator.set_move_input(Vec2::Y, MovementState::Cutscene);
        assert_eq!(integrator.move_input(), Vec2::ZERO);

        integrator.apply_look(&mut body, Vec2::new(100.0, 0.0));
        assert!((integrator.look_yaw() - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_look_pitch_clamped() {
        let mut integrator = integrator();
        let mut body = body();

        integrator.apply_look(&mut body, Vec2::new(0.0, -10_000.0));
        assert!((integrator.look_pitch() - 89.5).abs() < 1e-4, "pitch={}", integrator.look_pitch());

        integrator.apply_look(&mut body, Vec2::new(600.0 / 0.15, 0.0));
        assert!((integrator.look_yaw() - -120.0).abs() < 1e-3, "Yaw wraps, yaw={}", integrator.look_yaw());
    }

    #[test]
    fn test_input_follows_yaw() {
        let mut integrator = integrator();
        let mut body = body();

        integrator.apply_look(&mut body, Vec2::new(90.0 / 0.15, 0.0));
        let world = integrator.input_to_world(Vec2::new(0.0, 1.0));

        assert!((world - Vec3::X).length() < 1e-4, "Forward after turning right is +X, got {world}");
        assert!((body.rotation * Vec3::NEG_Z - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn test_snap_reaches_target_and_releases_lock() {
        let mut integrator = integrator();
        let mut body = body();
        body.set_velocity(Vec3::new(3.0, 0.0, 0.0));
        let target = Vec3::new(0.0, 0.0, 4.0);

        integrator.snap_to(&mut body, target, 0.2, None);
        assert!(integrator.is_snap_input_locked());
        assert!(!integrator.is_look_input_allowed());
        assert_eq!(body.velocity(), Vec3::ZERO);

        let mut completed = None;
        for _ in 0..20 {
            if let Some(done) = integrator.tick_snap(&mut body, DT) {
                completed = Some(done);
                break;
            }
        }

        assert_eq!(completed.map(|done| done.position), Some(target));
        assert_eq!(body.position, target);
        assert!(!integrator.is_snapping());
        assert!(integrator.is_look_input_allowed(), "Snap should release its own lock");
    }

    #[test]
    fn test_snap_keeps_lock_it_did_not_take() {
        let mut integrator = integrator();
        let mut body = body();
        integrator.set_external_input_allowed(false);

        integrator.snap_to(&mut body, Vec3::X, 0.05, None);
        assert!(!integrator.is_snap_input_locked());

        while integrator.tick_snap(&mut body, DT).is_none() {}

        assert!(!integrator.external_input_allowed(), "Snap must not grant input it never took");
    }

    #[test]
    fn test_replacing_snap_releases_previous_lock() {
        let mut integrator = integrator();
        let mut body = body();

        integrator.snap_to(&mut body, Vec3::X, 1.0, None);
        integrator.set_external_input_allowed(false);
        integrator.snap_to(&mut body, Vec3::Z, 1.0, None);

        assert!(!integrator.is_snap_input_locked(), "First lock released, second snap took none");
    }

    #[test]
    fn test_snap_duration_clamped() {
        let mut integrator = integrator();
        let mut body = body();

        integrator.snap_to(&mut body, Vec3::new(10.0, 0.0, 0.0), 60.0, None);
        let mut steps = 0;
        while integrator.tick_snap(&mut body, DT).is_none() {
            steps += 1;
            assert!(steps < 200, "Snap should be capped at snap_max_duration");
        }
        assert!(steps >= 90, "Should run most of the capped duration, steps={steps}");
    }

    #[test]
    fn test_snap_rotates_and_syncs_look() {
        let mut integrator = integrator();
        let mut body = body();
        let facing = Quat::from_rotation_y(-std::f32::consts::FRAC_PI_2);

        integrator.snap_to(&mut body, Vec3::ZERO, 0.1, Some(facing));
        while integrator.tick_snap(&mut body, DT).is_none() {}

        assert!(body.rotation.angle_between(facing) < 1e-4);
        assert!((integrator.look_yaw() - 90.0).abs() < 1e-3, "yaw={}", integrator.look_yaw());
    }
}
