//! Easing curves for snaps and platform travel.

use serde::{Deserialize, Serialize};

/// A normalized easing curve mapping `t ∈ [0, 1]` to progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EasingCurve {
    Linear,
    /// Cubic ease with zero slope at both ends.
    #[default]
    EaseInOut,
    EaseIn,
    EaseOut,
}

impl EasingCurve {
    /// Evaluate the curve. Input is clamped to `[0, 1]`.
    pub fn evaluate(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseInOut => t * t * (3.0 - 2.0 * t),
            Self::EaseIn => t * t,
            Self::EaseOut => t * (2.0 - t),
        }
    }
}
