//! Character locomotion.
//!
//! This module implements platformer movement with:
//!
//! - Ground sensing with a grace window for rising platforms
//! - Traction and damping blended per surface
//! - Acceleration, turning and braking relative to the camera yaw
//! - Jump queueing and coyote time
//! - Double-tap dashes with a cooldown
//! - Timed snaps for teleports and rewinds
//!
//! # Design
//!
//! Movement is driven by the [`CharacterController`], which owns one
//! character's components and runs them in a fixed order every step. Gameplay
//! code never writes velocity directly: it queues changes on the
//! [`VelocityIntegrator`], which applies them once per step.
//!
//! Everything is deterministic given the same inputs and tick times.

mod config;
mod controller;
mod dash;
mod ground;
mod integrator;
mod jump;
mod state;

pub use config::{GroundSensorConfig, MovementConfig};
pub use controller::{CharacterConfig, CharacterController, Surroundings};
pub use dash::{DashContext, DashGesture, DashGestureState, DashTiming};
pub use ground::{GroundSensor, GroundState, GroundTransition};
pub use integrator::{Support, VelocityIntegrator};
pub use jump::{JumpArbiter, JumpTiming};
pub use state::{LocomotionStateMachine, MovementState};
