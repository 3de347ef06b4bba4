//! Movement configuration.
//!
//! All locomotion tuning lives here. Values use meters and seconds unless
//! noted otherwise.

use serde::{Deserialize, Serialize};

use crate::easing::EasingCurve;
use crate::error::{PhysicsError, PhysicsResult};
use crate::surface::SurfaceProperties;

/// Ground probe and moving-platform contact tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundSensorConfig {
    /// Radius of the probe sphere. Zero probes with a ray.
    pub probe_radius: f32,

    /// How far below the feet the probe reaches (meters).
    pub probe_distance: f32,

    /// After stepping onto a platform, platform velocity reads are ignored
    /// for this long (seconds).
    pub platform_effect_block_window: f32,

    /// How long contact is kept while a platform rises away from the feet
    /// (seconds).
    pub platform_grounded_grace: f32,

    /// Largest vertical gap to the last contact point that still counts as
    /// grounded during the grace window (meters).
    pub platform_grounded_max_separation: f32,
}

impl Default for GroundSensorConfig {
    fn default() -> Self {
        Self {
            probe_radius: 0.15,
            probe_distance: 0.3,
            platform_effect_block_window: 0.1,
            platform_grounded_grace: 0.05,
            platform_grounded_max_separation: 0.12,
        }
    }
}

/// Configuration for character locomotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    // ========================================================================
    // Locomotion
    // ========================================================================
    /// Target lateral speed with full input (meters/second).
    pub max_speed: f32,

    /// Authority along the input direction (meters/second²).
    pub acceleration: f32,

    /// Authority perpendicular to the input direction, used to redirect
    /// existing velocity (meters/second²).
    pub turn_acceleration: f32,

    /// Braking with no input (meters/second²).
    pub damping: f32,

    /// Fraction of traction available while airborne (0.0 - 1.0).
    pub air_control: f32,

    /// Inherit velocity from the platform underfoot.
    pub move_with_platform: bool,

    /// Suspend gravity while dashing.
    pub ignore_gravity_during_dash: bool,

    // ========================================================================
    // Traction
    // ========================================================================
    /// Surface values used in the air and on surfaces without properties.
    pub default_surface: SurfaceProperties,

    /// How fast traction eases toward the current surface (units/second).
    pub traction_rate: f32,

    /// How fast damping eases toward the current surface (units/second).
    pub damping_rate: f32,

    // ========================================================================
    // Jump
    // ========================================================================
    /// Vertical speed set by a jump (meters/second).
    pub jump_speed: f32,

    /// How long a premature jump press keeps retrying (seconds).
    pub queue_time: f32,

    /// How long after leaving the ground a jump is still allowed (seconds).
    pub coyote_time: f32,

    // ========================================================================
    // Dash
    // ========================================================================
    /// Velocity set by a dash (meters/second).
    pub dash_strength: f32,

    /// How long the Dashing state is held (seconds).
    pub dash_duration: f32,

    /// Minimum time between dashes (seconds).
    pub dash_cooldown: f32,

    /// Maximum gap between the two taps of a double tap (seconds).
    pub double_tap_window: f32,

    /// Minimum dot product between tap directions to count as a repeat.
    pub direction_match_threshold: f32,

    // ========================================================================
    // Snap
    // ========================================================================
    /// Snap duration used when the caller passes zero (seconds).
    pub snap_duration: f32,

    /// Upper bound for any snap (seconds).
    pub snap_max_duration: f32,

    /// A snap ends early within this distance of the target (meters).
    pub snap_completion_distance: f32,

    /// ...and within this angle of the target rotation (degrees).
    pub snap_completion_angle_deg: f32,

    pub snap_curve: EasingCurve,

    // ========================================================================
    // Look
    // ========================================================================
    /// Degrees of rotation per unit of look input.
    pub look_sensitivity: f32,

    /// Total pitch range (degrees). Pitch is clamped to half of this either way.
    pub max_look_pitch_deg: f32,

    /// Body yaw follows the look yaw.
    pub lock_forward_to_look: bool,

    pub ground: GroundSensorConfig,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            max_speed: 6.0,
            acceleration: 12.0,
            turn_acceleration: 18.0,
            damping: 10.0,
            air_control: 0.3,
            move_with_platform: true,
            ignore_gravity_during_dash: true,

            default_surface: SurfaceProperties::NORMAL,
            traction_rate: 10.0,
            damping_rate: 10.0,

            jump_speed: 6.0,
            queue_time: 0.12,
            coyote_time: 0.12,

            dash_strength: 16.0,
            dash_duration: 0.25,
            dash_cooldown: 0.6,
            double_tap_window: 0.35,
            direction_match_threshold: 0.75,

            snap_duration: 0.25,
            snap_max_duration: 2.0,
            snap_completion_distance: 0.05,
            snap_completion_angle_deg: 2.0,
            snap_curve: EasingCurve::EaseInOut,

            look_sensitivity: 0.15,
            max_look_pitch_deg: 179.0,
            lock_forward_to_look: true,

            ground: GroundSensorConfig::default(),
        }
    }
}

impl MovementConfig {
    /// Snappy ground control, generous timing windows.
    pub fn arcade() -> Self {
        Self {
            max_speed: 8.0,
            acceleration: 30.0,
            turn_acceleration: 40.0,
            damping: 20.0,
            air_control: 0.6,
            jump_speed: 7.0,
            queue_time: 0.2,
            coyote_time: 0.15,
            dash_cooldown: 0.4,
            ..Default::default()
        }
    }

    /// Slow to start, slow to stop, weak air control.
    pub fn floaty() -> Self {
        Self {
            max_speed: 5.0,
            acceleration: 6.0,
            turn_acceleration: 8.0,
            damping: 3.0,
            air_control: 0.15,
            jump_speed: 5.0,
            dash_strength: 12.0,
            dash_duration: 0.35,
            ..Default::default()
        }
    }

    /// Clamp every field into its usable range.
    pub fn sanitized(&self) -> Self {
        let snap_max_duration = self.snap_max_duration.max(0.001);
        Self {
            max_speed: self.max_speed.max(0.0),
            acceleration: self.acceleration.max(0.0),
            turn_acceleration: self.turn_acceleration.max(0.0),
            damping: self.damping.max(0.0),
            air_control: self.air_control.clamp(0.0, 1.0),
            move_with_platform: self.move_with_platform,
            ignore_gravity_during_dash: self.ignore_gravity_during_dash,

            default_surface: self.default_surface.sanitized(),
            traction_rate: self.traction_rate.max(0.0),
            damping_rate: self.damping_rate.max(0.0),

            jump_speed: self.jump_speed.max(0.0),
            queue_time: self.queue_time.max(0.0),
            coyote_time: self.coyote_time.max(0.0),

            dash_strength: self.dash_strength.max(0.0),
            dash_duration: self.dash_duration.max(0.0),
            dash_cooldown: self.dash_cooldown.max(0.0),
            double_tap_window: self.double_tap_window.max(0.05),
            direction_match_threshold: self.direction_match_threshold.clamp(0.0, 1.0),

            snap_duration: self.snap_duration.max(0.0),
            snap_max_duration,
            snap_completion_distance: self.snap_completion_distance.max(0.0),
            snap_completion_angle_deg: self.snap_completion_angle_deg.max(0.0),
            snap_curve: self.snap_curve,

            look_sensitivity: self.look_sensitivity,
            max_look_pitch_deg: self.max_look_pitch_deg.clamp(0.0, 180.0),
            lock_forward_to_look: self.lock_forward_to_look,

            ground: GroundSensorConfig {
                probe_radius: self.ground.probe_radius.max(0.0),
                probe_distance: self.ground.probe_distance.max(0.0),
                platform_effect_block_window: self.ground.platform_effect_block_window.max(0.0),
                platform_grounded_grace: self.ground.platform_grounded_grace.max(0.0),
                platform_grounded_max_separation: self
                    .ground
                    .platform_grounded_max_separation
                    .max(0.0),
            },
        }
    }

    /// Report the first value [`sanitized`](Self::sanitized) would change.
    pub fn validate(&self) -> PhysicsResult<()> {
        let non_negative = [
            ("max_speed", self.max_speed),
            ("acceleration", self.acceleration),
            ("turn_acceleration", self.turn_acceleration),
            ("damping", self.damping),
            ("traction_rate", self.traction_rate),
            ("damping_rate", self.damping_rate),
            ("jump_speed", self.jump_speed),
            ("queue_time", self.queue_time),
            ("coyote_time", self.coyote_time),
            ("dash_strength", self.dash_strength),
            ("dash_duration", self.dash_duration),
            ("dash_cooldown", self.dash_cooldown),
            ("snap_duration", self.snap_duration),
            ("probe_radius", self.ground.probe_radius),
            ("probe_distance", self.ground.probe_distance),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) {
                return Err(PhysicsError::config(field, format!("must not be negative, got {value}")));
            }
        }

        if !(0.0..=1.0).contains(&self.air_control) {
            return Err(PhysicsError::config("air_control", "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.direction_match_threshold) {
            return Err(PhysicsError::config(
                "direction_match_threshold",
                "must be within [0, 1]",
            ));
        }
        if self.double_tap_window < 0.05 {
            return Err(PhysicsError::config("double_tap_window", "must be at least 0.05 s"));
        }
        if !(self.snap_max_duration > 0.0) {
            return Err(PhysicsError::config("snap_max_duration", "must be positive"));
        }
        if self.default_surface != self.default_surface.sanitized() {
            return Err(PhysicsError::config("default_surface", "multipliers must be within [0, 2]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for config in [
            MovementConfig::default(),
            MovementConfig::arcade(),
            MovementConfig::floaty(),
        ] {
            assert!(config.validate().is_ok(), "{config:?}");
            assert_eq!(config.sanitized(), config, "Presets should already be sane");
        }
    }

    #[test]
    fn test_sanitize_clamps() {
        let config = MovementConfig {
            air_control: 3.0,
            queue_time: -1.0,
            double_tap_window: 0.0,
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(PhysicsError::InvalidConfiguration { field: "queue_time", .. })
        ));

        let fixed = config.sanitized();
        assert_eq!(fixed.air_control, 1.0);
        assert_eq!(fixed.queue_time, 0.0);
        assert_eq!(fixed.double_tap_window, 0.05);
        assert!(fixed.validate().is_ok());
    }
}
