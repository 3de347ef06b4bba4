//! Collision detection for the character and its probes.
//!
//! # Key Types
//!
//! - [`CollisionWorld`]: The collision environment containing all geometry
//! - [`TraceResult`]: Output from a collision trace
//! - [`TraceShape`]: Shape used for tracing (capsule, sphere or point)
//!
//! Brushes may carry [`SurfaceProperties`](crate::surface::SurfaceProperties)
//! and a link to the platform that moves them, which is how ground contacts
//! are resolved to surfaces and platforms.

mod flags;
mod trace;
mod world;

pub use flags::ContentFlags;
pub use trace::{TraceResult, TraceShape};
pub use world::{BrushId, CollisionBrush, CollisionWorld, CONTACT_SKIN};
