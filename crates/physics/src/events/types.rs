//! Event payloads published by the locomotion core.

use glam::{Quat, Vec3};

use crate::collision::BrushId;
use crate::platform::PlatformId;
use crate::rewind::JumpSnapshot;

/// Grounded flag flipped this step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundedChanged {
    pub is_grounded: bool,
    /// Contact normal, or body-up when ungrounded.
    pub ground_normal: Vec3,
    pub ground_surface: Option<BrushId>,
}

/// Character touched down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landed {
    pub time: f64,
    pub position: Vec3,
}

/// Character left the ground, by jumping or by walking off a ledge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ungrounded {
    pub time: f64,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
}

/// Grounded on a platform that differs from the previous contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingPlatformEntered {
    pub platform: PlatformId,
    pub contact_point: Vec3,
    /// Whether the previous entry block window was still running.
    pub entry_was_blocked: bool,
}

/// Fired right before a jump modifies velocity. Pose and velocity are the
/// pre-jump values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreJumpCalculation {
    pub time: f64,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashExecuted {
    pub direction: Vec3,
    pub strength: f32,
    pub duration: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashCooldownFinished {
    pub ready_time: f64,
    pub cooldown: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpPadBoost {
    pub contact_point: Vec3,
    pub direction: Vec3,
    /// Magnitude of the applied velocity change.
    pub force: f32,
}

/// A rewind started. `snap_time` is how long the return snap will take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UndoBegan {
    pub snapshot: JumpSnapshot,
    pub snap_time: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UndoCompleted {
    pub time: f64,
}

/// Host-level time direction. While reversing, scrubbable objects step with
/// `reversal_fixed_delta` (negative) instead of the forward fixed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reversal {
    pub is_reversing: bool,
    pub reversal_fixed_delta: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapCompleted {
    pub position: Vec3,
}

/// A platform moved by a non-zero amount this step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformMoved {
    pub platform: PlatformId,
    pub frame_delta: Vec3,
}
