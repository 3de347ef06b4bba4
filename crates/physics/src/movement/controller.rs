//! Character movement controller.
//!
//! This is the main entry point for one character. It owns the body and every
//! locomotion component, turns input edges into component calls and runs the
//! fixed-step ordering.

use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::body::{BodyConfig, CharacterBody};
use crate::collision::CollisionWorld;
use crate::error::PhysicsResult;
use crate::events::{EventBus, SnapCompleted};
use crate::jump_pad::{BoostContext, JumpPadSet};
use crate::platform::PlatformMotion;
use crate::rewind::{JumpHistory, RewindConfig, RewindController, RewindParts};
use crate::time::Tick;

use super::config::MovementConfig;
use super::dash::{DashContext, DashGesture, DashTiming};
use super::ground::{GroundSensor, GroundTransition};
use super::integrator::{Support, VelocityIntegrator};
use super::jump::{JumpArbiter, JumpTiming};
use super::state::{LocomotionStateMachine, MovementState};

/// Everything needed to build a character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub body: BodyConfig,
    pub movement: MovementConfig,
    pub rewind: RewindConfig,
}

impl CharacterConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            body: self.body.sanitized(),
            movement: self.movement.sanitized(),
            rewind: self.rewind.sanitized(),
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        self.body.validate()?;
        self.movement.validate()?;
        self.rewind.validate()
    }
}

/// What the character is simulated against this step.
pub struct Surroundings<'a> {
    pub world: Option<&'a CollisionWorld>,
    pub platforms: &'a dyn PlatformMotion,
    pub jump_pads: Option<&'a mut JumpPadSet>,
}

/// Character controller.
///
/// Per fixed step, in order:
/// - body integration (gravity and slide move)
/// - ground sensing
/// - state machine timers and auto transitions
/// - jump, dash and jump pad deltas queued on the integrator
/// - integration of locomotion and the queued deltas
/// - snap progress, rewind bookkeeping and jump history expiry
///
/// ```ignore
/// let mut character = CharacterController::new(spawn, CharacterConfig::default(), bus);
///
/// // Each fixed step:
/// character.set_move_input(stick);
/// character.fixed_update(surroundings, Tick::new(now, dt));
/// ```
#[derive(Debug)]
pub struct CharacterController {
    bus: Arc<EventBus>,
    body: CharacterBody,
    sensor: GroundSensor,
    machine: LocomotionStateMachine,
    integrator: VelocityIntegrator,
    jump: JumpArbiter,
    dash: DashGesture,
    history: JumpHistory,
    rewind: RewindController,
}

impl CharacterController {
    pub fn new(position: Vec3, config: CharacterConfig, bus: Arc<EventBus>) -> Self {
        let config = config.sanitized();
        let movement = &config.movement;
        Self {
            body: CharacterBody::new(position, config.body.clone()),
            sensor: GroundSensor::new(movement.ground.clone(), bus.clone()),
            machine: LocomotionStateMachine::new(),
            jump: JumpArbiter::new(JumpTiming::from(movement), bus.clone()),
            dash: DashGesture::new(DashTiming::from(movement), bus.clone()),
            integrator: VelocityIntegrator::new(movement.clone(), bus.clone()),
            history: JumpHistory::new(config.rewind.history.clone(), bus.clone()),
            rewind: RewindController::new(config.rewind.clone(), bus.clone()),
            bus,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn body(&self) -> &CharacterBody {
        &self.body
    }

    pub fn state(&self) -> MovementState {
        self.machine.state()
    }

    pub fn machine(&self) -> &LocomotionStateMachine {
        &self.machine
    }

    pub fn sensor(&self) -> &GroundSensor {
        &self.sensor
    }

    pub fn integrator(&self) -> &VelocityIntegrator {
        &self.integrator
    }

    pub fn jump(&self) -> &JumpArbiter {
        &self.jump
    }

    pub fn dash(&self) -> &DashGesture {
        &self.dash
    }

    pub fn history(&self) -> &JumpHistory {
        &self.history
    }

    pub fn is_grounded(&self) -> bool {
        self.sensor.is_grounded()
    }

    pub fn is_undoing(&self) -> bool {
        self.rewind.is_in_progress()
    }

    pub fn look_yaw(&self) -> f32 {
        self.integrator.look_yaw()
    }

    pub fn look_pitch(&self) -> f32 {
        self.integrator.look_pitch()
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Held movement stick. Ignored while movement input is not allowed.
    pub fn set_move_input(&mut self, input: Vec2) {
        self.integrator.set_move_input(input, self.machine.state());
    }

    /// Look delta for this frame.
    pub fn apply_look(&mut self, input: Vec2) {
        self.integrator.apply_look(&mut self.body, input);
    }

    /// Jump press edge. Returns true if the jump executed immediately.
    pub fn press_jump(&mut self, now: f64) -> bool {
        if !self.integrator.is_movement_input_allowed(self.machine.state()) {
            return false;
        }
        let grounded = self.sensor.is_grounded();
        self.jump
            .request_jump(now, grounded, &self.body, &mut self.integrator)
    }

    /// Discrete move tap for dash detection. Returns true if it dashed.
    pub fn move_tap(&mut self, raw: Vec2, now: f64) -> bool {
        let ground_normal = self.sensor.state().normal;
        self.dash.on_move_tap(
            raw,
            DashContext {
                now,
                ground_normal,
                body: &self.body,
                integrator: &mut self.integrator,
                machine: &mut self.machine,
            },
        )
    }

    /// Undo the last recorded jump. Returns true if an undo started.
    pub fn undo(&mut self, world: Option<&CollisionWorld>, tick: Tick) -> bool {
        self.rewind.begin_undo(
            RewindParts {
                world,
                body: &mut self.body,
                integrator: &mut self.integrator,
                machine: &mut self.machine,
                history: &self.history,
            },
            tick,
        )
    }

    /// Scripted teleport. See [`VelocityIntegrator::snap_to`].
    pub fn snap_to(&mut self, target: Vec3, duration: f32, rotation: Option<Quat>) {
        self.integrator
            .snap_to(&mut self.body, target, duration, rotation);
    }

    // ========================================================================
    // Pose
    // ========================================================================

    /// Place the character without any motion, as when loading a save.
    pub fn place(&mut self, position: Vec3, rotation: Quat) {
        self.body.position = position;
        self.body.rotation = if rotation.is_normalized() {
            rotation
        } else {
            rotation.normalize()
        };
        self.body.set_velocity(Vec3::ZERO);
        self.integrator.sync_look_to(self.body.rotation);
        self.history.clear();
    }

    // ========================================================================
    // Fixed step
    // ========================================================================

    /// Advance the character by one fixed step.
    pub fn fixed_update(&mut self, surroundings: Surroundings<'_>, tick: Tick) {
        let Surroundings {
            world,
            platforms,
            jump_pads,
        } = surroundings;
        let now = tick.now;

        self.body.step(world, tick.dt);

        let transition = self.sensor.tick(world, platforms, &self.body, now);
        let grounded = self.sensor.is_grounded();

        self.machine.tick(now);
        self.machine.auto_transition(grounded, now);

        if !self.integrator.is_movement_input_allowed(self.machine.state()) {
            self.jump.clear_queue();
        }
        match transition {
            GroundTransition::Landed => {
                self.jump.on_landed(now, &self.body, &mut self.integrator);
            }
            GroundTransition::Ungrounded => self.jump.on_ungrounded(now),
            GroundTransition::None => {}
        }
        self.jump
            .tick(now, grounded, &self.body, &mut self.integrator);
        self.dash.tick(now);

        if let (Some(world), Some(pads)) = (world, jump_pads) {
            pads.apply_overlapping(
                world,
                BoostContext {
                    now,
                    body: &self.body,
                    integrator: &mut self.integrator,
                    machine: &mut self.machine,
                },
            );
        }

        let support = self.support(world, platforms, tick);
        self.integrator
            .fixed_step(&mut self.body, &mut self.machine, &support, tick);

        if let Some(completed) = self.integrator.tick_snap(&mut self.body, tick.dt) {
            self.finish_snap(world, &completed, now);
        }

        self.rewind.tick(&mut self.body);
        self.history.tick(now);
    }

    fn support(
        &self,
        world: Option<&CollisionWorld>,
        platforms: &dyn PlatformMotion,
        tick: Tick,
    ) -> Support {
        let ground = self.sensor.state();
        if !ground.is_grounded {
            return Support::airborne(self.body.up());
        }

        let default_surface = self.integrator.config().default_surface;
        let surface = ground
            .surface
            .zip(world)
            .and_then(|(brush, world)| world.surface_of(brush))
            .unwrap_or(default_surface);
        let platform_velocity = ground
            .platform
            .and_then(|platform| platforms.platform_velocity(platform, tick.dt));

        Support {
            grounded: true,
            normal: ground.normal,
            surface,
            platform_velocity,
            platform_effect_blocked: self.sensor.is_platform_effect_blocked(tick.now),
        }
    }

    fn finish_snap(&mut self, world: Option<&CollisionWorld>, completed: &SnapCompleted, now: f64) {
        let finished_undo = self.rewind.on_snap_completed(
            completed,
            RewindParts {
                world,
                body: &mut self.body,
                integrator: &mut self.integrator,
                machine: &mut self.machine,
                history: &self.history,
            },
            now,
        );
        if !finished_undo {
            log::debug!("snap completed at {}", completed.position);
        }
    }
}
