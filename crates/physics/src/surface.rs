//! Per-surface traction and damping.
//!
//! A brush may carry [`SurfaceProperties`]. While the character stands on it,
//! the integrator's [`TractionSample`] eases toward those values; in the air or
//! on a plain brush it eases back toward the defaults.

use serde::{Deserialize, Serialize};

/// Largest multiplier a surface can declare.
pub const MAX_SURFACE_MULTIPLIER: f32 = 2.0;

/// Movement multipliers attached to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceProperties {
    /// Scales acceleration and turn authority. 1.0 is normal ground.
    pub traction: f32,
    /// Scales braking when there is no input. 1.0 is normal ground.
    pub damping: f32,
}

impl Default for SurfaceProperties {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl SurfaceProperties {
    pub const NORMAL: Self = Self {
        traction: 1.0,
        damping: 1.0,
    };

    /// Slippery: little grip, almost no braking.
    pub const ICE: Self = Self {
        traction: 0.15,
        damping: 0.05,
    };

    /// High grip, stops quickly.
    pub const GRIPPY: Self = Self {
        traction: 1.6,
        damping: 2.0,
    };

    /// Build a surface, clamping both multipliers into `[0, 2]`.
    pub fn new(traction: f32, damping: f32) -> Self {
        Self {
            traction: clamp_multiplier(traction),
            damping: clamp_multiplier(damping),
        }
    }

    pub fn sanitized(self) -> Self {
        Self::new(self.traction, self.damping)
    }
}

fn clamp_multiplier(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, MAX_SURFACE_MULTIPLIER)
    } else {
        1.0
    }
}

/// Smoothed traction/damping the integrator actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TractionSample {
    pub traction: f32,
    pub damping: f32,
}

impl Default for TractionSample {
    fn default() -> Self {
        Self::from(SurfaceProperties::NORMAL)
    }
}

impl From<SurfaceProperties> for TractionSample {
    fn from(surface: SurfaceProperties) -> Self {
        Self {
            traction: surface.traction,
            damping: surface.damping,
        }
    }
}

impl TractionSample {
    /// Move each value toward `target` by at most `rate * dt`.
    pub fn step_towards(
        &mut self,
        target: SurfaceProperties,
        traction_rate: f32,
        damping_rate: f32,
        dt: f32,
    ) {
        self.traction = move_towards(self.traction, target.traction, traction_rate * dt);
        self.damping = move_towards(self.damping, target.damping, damping_rate * dt);
    }
}

/// Step `current` toward `target` without overshooting.
#[inline]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let diff = target - current;
    if diff.abs() <= max_delta.max(0.0) {
        target
    } else {
        current + diff.signum() * max_delta.max(0.0)
    }
}
