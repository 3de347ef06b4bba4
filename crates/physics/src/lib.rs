//! Hopper Physics
//!
//! The locomotion core of a 3D platformer: ground contact, velocity
//! integration, jumps, dashes, moving platforms and a jump rewind. Every
//! component is driven by explicit ticks so a session replays identically
//! from the same inputs.
//!
//! # Architecture
//!
//! - **Collision**: brushes, traces and probes over parry3d shapes
//! - **Body**: gravity and slide-move integration of one character
//! - **Movement**: sensing, state arbitration and velocity changes
//! - **Platform**: reversible waypoint traversal for moving platforms
//! - **Rewind**: jump history and the undo that replays it backwards
//!
//! Components talk through a typed [`EventBus`] shared as an `Arc`.

pub mod body;
pub mod collision;
pub mod easing;
pub mod error;
pub mod events;
pub mod jump_pad;
pub mod movement;
pub mod platform;
pub mod rewind;
pub mod surface;
pub mod time;

// Re-export commonly used types
pub use body::{BodyConfig, CharacterBody};
pub use collision::{BrushId, CollisionWorld, ContentFlags, TraceResult, TraceShape};
pub use error::{PhysicsError, PhysicsResult};
pub use events::{Event, EventBus};
pub use jump_pad::{JumpPad, JumpPadConfig, JumpPadSet};
pub use movement::{
    CharacterConfig, CharacterController, MovementConfig, MovementState, Surroundings,
};
pub use platform::{PlatformConfig, PlatformId, PlatformMotion, PlatformSaveState, PlatformSet};
pub use rewind::{JumpHistory, JumpSnapshot, RewindConfig};
pub use surface::SurfaceProperties;
pub use time::Tick;
