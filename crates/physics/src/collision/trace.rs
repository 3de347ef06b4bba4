//! Trace results and shapes for collision queries.

use glam::Vec3;

use super::flags::ContentFlags;
use super::world::BrushId;

/// Result of a collision trace through the world.
///
/// Traces sweep a shape from a start position to an end position and
/// report what was hit along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceResult {
    /// How far along the trace path we got before hitting something.
    ///
    /// - `1.0` = traveled the full distance (no collision)
    /// - `0.0` = hit something immediately at start
    pub fraction: f32,

    /// Shape origin at the end of the trace.
    pub end_position: Vec3,

    /// Surface normal at the impact, pointing away from the surface.
    /// `None` if nothing was hit.
    pub hit_normal: Option<Vec3>,

    /// Approximate world-space contact point. `None` if nothing was hit.
    pub hit_point: Option<Vec3>,

    /// Content flags of what was hit.
    pub hit_contents: ContentFlags,

    /// Brush that was hit.
    pub hit_brush: Option<BrushId>,

    /// Whether the trace started inside solid geometry.
    pub started_in_solid: bool,

    /// Whether the entire trace was inside solid geometry.
    pub all_solid: bool,
}

impl Default for TraceResult {
    fn default() -> Self {
        Self::no_hit(Vec3::ZERO)
    }
}

impl TraceResult {
    /// Create a trace result indicating no collision occurred.
    pub fn no_hit(end_position: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end_position,
            hit_normal: None,
            hit_point: None,
            hit_contents: ContentFlags::EMPTY,
            hit_brush: None,
            started_in_solid: false,
            all_solid: false,
        }
    }

    /// Check if this trace hit something.
    #[inline]
    pub fn hit_something(&self) -> bool {
        self.fraction < 1.0
    }

    /// Get the hit normal, defaulting to up if none.
    #[inline]
    pub fn normal_or_up(&self) -> Vec3 {
        self.hit_normal.unwrap_or(Vec3::Y)
    }
}

/// Shape used for collision traces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceShape {
    /// A vertical capsule whose origin is the bottom of the lower cap.
    Capsule {
        /// Radius of the capsule cylinder and end caps.
        radius: f32,
        /// Total height from bottom of lower cap to top of upper cap.
        height: f32,
    },

    /// A sphere centered on the trace origin. Used for ground probes.
    Sphere { radius: f32 },

    /// A single point (infinitely small).
    Point,
}

impl TraceShape {
    /// Default character capsule.
    pub const CHARACTER: Self = Self::Capsule {
        radius: 0.35,
        height: 1.8,
    };

    /// Get the effective radius of this shape for collision purposes.
    pub fn radius(&self) -> f32 {
        match self {
            Self::Capsule { radius, .. } | Self::Sphere { radius } => *radius,
            Self::Point => 0.0,
        }
    }

    /// Offset from the trace origin to the shape's center.
    pub fn center_offset(&self) -> Vec3 {
        match self {
            Self::Capsule { height, .. } => Vec3::Y * (height * 0.5),
            Self::Sphere { .. } | Self::Point => Vec3::ZERO,
        }
    }
}

impl Default for TraceShape {
    fn default() -> Self {
        Self::CHARACTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_result_no_hit() {
        let result = TraceResult::no_hit(Vec3::new(10.0, 0.0, 0.0));
        assert!(!result.hit_something());
        assert_eq!(result.fraction, 1.0);
        assert!(result.hit_normal.is_none());
        assert!(result.hit_brush.is_none());
        assert_eq!(result.normal_or_up(), Vec3::Y);
    }

    #[test]
    fn test_shape_center_offset() {
        let capsule = TraceShape::Capsule {
            radius: 0.5,
            height: 2.0,
        };
        assert_eq!(capsule.center_offset(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(TraceShape::Sphere { radius: 0.2 }.center_offset(), Vec3::ZERO);
        assert_eq!(TraceShape::Sphere { radius: 0.2 }.radius(), 0.2);
    }
}
