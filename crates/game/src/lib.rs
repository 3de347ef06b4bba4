//! Hopper Game Logic
//!
//! This crate hosts the locomotion core:
//!
//! - Raw input conversion into per-step commands
//! - Level construction (geometry, moving platforms, jump pads)
//! - The fixed-step simulation loop and time reversal during undos
//! - Save data and its binary codec
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Simulation                            │
//! │  ┌─────────┐    ┌───────────┐    ┌────────────────────────┐  │
//! │  │ Input   │───►│ Platforms │───►│ Character              │  │
//! │  │ Command │    │ (scrubbed │    │ (sensor, state, jump,  │  │
//! │  └─────────┘    │ by undos) │    │  dash, integrator)     │  │
//! │                 └───────────┘    └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod input;
pub mod level;
pub mod reversal;
pub mod save;
pub mod simulation;

// Re-export main types
pub use input::{InputCommand, PlayerInput};
pub use level::{Level, SpawnPoint};
pub use reversal::TimeReversal;
pub use save::{SaveData, SaveError};
pub use simulation::{Simulation, SimulationConfig};

// Re-export physics types for convenience
pub use hopper_physics::{
    CharacterConfig, CharacterController, CollisionWorld, ContentFlags, EventBus,
    MovementConfig, MovementState,
};
