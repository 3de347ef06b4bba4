//! Player input handling.
//!
//! This module converts raw input (keys and mouse) into the per-step
//! command the character controller consumes. Taps and presses are edges,
//! so conversion needs the previous frame's input as well.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Raw player input for a single frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Movement keys held.
    pub movement: MovementInput,

    /// Mouse delta this frame (pixels).
    pub mouse_delta: (f32, f32),

    /// Action buttons held.
    pub actions: ActionInput,

    /// Frame number this input was generated.
    pub frame: u32,
}

/// Movement key states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

/// Action button states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInput {
    pub jump: bool,
    pub undo: bool,
}

/// What the character should do this step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputCommand {
    /// Held movement, x = right, y = forward. Length at most 1.
    pub move_axis: Vec2,
    /// Look delta in input units (x = yaw, y = pitch).
    pub look: Vec2,
    /// Direction of movement keys pressed this frame, for dash detection.
    pub move_tap: Option<Vec2>,
    pub jump_pressed: bool,
    pub undo_pressed: bool,
}

impl MovementInput {
    /// Axis from the held keys. Opposing keys cancel.
    pub fn axis(&self) -> Vec2 {
        let mut axis = Vec2::ZERO;
        if self.forward {
            axis.y += 1.0;
        }
        if self.backward {
            axis.y -= 1.0;
        }
        if self.right {
            axis.x += 1.0;
        }
        if self.left {
            axis.x -= 1.0;
        }
        axis
    }

    /// Keys held now that were not held in `previous`.
    fn pressed_since(&self, previous: &Self) -> Self {
        Self {
            forward: self.forward && !previous.forward,
            backward: self.backward && !previous.backward,
            left: self.left && !previous.left,
            right: self.right && !previous.right,
        }
    }
}

impl PlayerInput {
    /// Convert to a command, detecting edges against `previous`.
    pub fn to_command(&self, previous: &PlayerInput) -> InputCommand {
        let tap = self.movement.pressed_since(&previous.movement).axis();

        InputCommand {
            // Normalize diagonal movement
            move_axis: self.movement.axis().clamp_length_max(1.0),
            look: Vec2::new(self.mouse_delta.0, self.mouse_delta.1),
            move_tap: (tap != Vec2::ZERO).then_some(tap),
            jump_pressed: self.actions.jump && !previous.actions.jump,
            undo_pressed: self.actions.undo && !previous.actions.undo,
        }
    }

    /// Check if any movement input is active.
    pub fn has_movement(&self) -> bool {
        self.movement.forward
            || self.movement.backward
            || self.movement.left
            || self.movement.right
    }
}
