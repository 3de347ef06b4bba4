//! Slide move collision response.
//!
//! The body is swept along its velocity; on contact the velocity is clipped
//! against the hit plane and the remaining time is spent sliding along it.

use glam::Vec3;

use crate::collision::{CollisionWorld, ContentFlags, TraceShape};

/// Maximum number of collision planes to track during one move.
const MAX_CLIP_PLANES: usize = 5;

/// Clip velocity against a surface normal.
///
/// Removes the component of velocity going into the surface. An overbounce
/// slightly above 1 pushes the result off the plane to prevent sticking.
pub fn clip_velocity(velocity: Vec3, normal: Vec3, overbounce: f32) -> Vec3 {
    let backoff = velocity.dot(normal);

    let adjusted_backoff = if backoff < 0.0 {
        backoff * overbounce
    } else {
        backoff / overbounce
    };

    velocity - normal * adjusted_backoff
}

/// What happened during a slide move.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlideOutcome {
    /// Number of planes the body touched.
    pub planes_hit: usize,
    /// Body ended the move wedged with zero velocity.
    pub stuck: bool,
}

/// Sweep `position` along `velocity` for `delta_time`, sliding along
/// whatever `mask` geometry is hit. Both arguments are updated in place.
#[allow(clippy::too_many_arguments)]
pub fn slide_move(
    world: &CollisionWorld,
    position: &mut Vec3,
    velocity: &mut Vec3,
    shape: TraceShape,
    mask: ContentFlags,
    delta_time: f32,
    max_iterations: usize,
    overbounce: f32,
) -> SlideOutcome {
    let mut time_remaining = delta_time;
    let original_velocity = *velocity;
    let mut planes = [Vec3::ZERO; MAX_CLIP_PLANES];
    let mut num_planes = 0;

    for _ in 0..max_iterations.max(1) {
        if velocity.length_squared() < 1e-8 || time_remaining <= 0.0 {
            break;
        }

        let target = *position + *velocity * time_remaining;
        let trace = world.trace(*position, target, shape, mask);

        if !trace.hit_something() {
            *position = trace.end_position;
            break;
        }

        if trace.fraction > 0.0 {
            *position = trace.end_position;
        }
        time_remaining *= 1.0 - trace.fraction;

        let Some(normal) = trace.hit_normal else {
            break;
        };

        if trace.all_solid {
            *velocity = Vec3::ZERO;
            return SlideOutcome {
                planes_hit: num_planes,
                stuck: true,
            };
        }

        if num_planes < MAX_CLIP_PLANES {
            planes[num_planes] = normal;
            num_planes += 1;
        }

        // Find a clip that satisfies every plane touched so far
        let mut found_valid = false;
        for i in 0..num_planes {
            let clipped = clip_velocity(*velocity, planes[i], overbounce);
            let valid = (0..num_planes)
                .filter(|&j| j != i)
                .all(|j| clipped.dot(planes[j]) >= -0.01);

            if valid {
                *velocity = clipped;
                found_valid = true;
                break;
            }
        }

        if !found_valid {
            if num_planes >= 2 {
                // Slide along the crease between the first two planes
                let crease = planes[0].cross(planes[1]).normalize_or_zero();
                *velocity = crease * original_velocity.dot(crease);
            } else {
                *velocity = Vec3::ZERO;
            }

            if *velocity == Vec3::ZERO {
                return SlideOutcome {
                    planes_hit: num_planes,
                    stuck: true,
                };
            }
        }
    }

    SlideOutcome {
        planes_hit: num_planes,
        stuck: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVERBOUNCE: f32 = 1.001;

    #[test]
    fn test_clip_velocity_wall() {
        let velocity = Vec3::new(10.0, 0.0, 5.0);
        let wall_normal = Vec3::new(-1.0, 0.0, 0.0);

        let clipped = clip_velocity(velocity, wall_normal, 1.0);

        assert!(clipped.x.abs() < 0.01);
        assert!((clipped.z - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_clip_velocity_floor_keeps_planar() {
        let velocity = Vec3::new(3.0, -4.0, 0.0);
        let clipped = clip_velocity(velocity, Vec3::Y, 1.0);
        assert_eq!(clipped, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_slide_move_no_collision() {
        let world = CollisionWorld::new();

        let mut position = Vec3::ZERO;
        let mut velocity = Vec3::new(5.0, 0.0, 0.0);

        let outcome = slide_move(
            &world,
            &mut position,
            &mut velocity,
            TraceShape::CHARACTER,
            ContentFlags::MASK_BODY,
            1.0,
            4,
            OVERBOUNCE,
        );

        assert_eq!(outcome.planes_hit, 0);
        assert!((position.x - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_slide_move_lands_on_floor() {
        let mut world = CollisionWorld::new();
        world.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(50.0, 0.5, 50.0),
            ContentFlags::SOLID,
        );

        let mut position = Vec3::new(0.0, 0.2, 0.0);
        let mut velocity = Vec3::new(2.0, -10.0, 0.0);

        slide_move(
            &world,
            &mut position,
            &mut velocity,
            TraceShape::CHARACTER,
            ContentFlags::MASK_BODY,
            0.1,
            4,
            OVERBOUNCE,
        );

        assert!(position.y.abs() < 0.01, "Should rest on the floor, y={}", position.y);
        assert!(velocity.y.abs() < 0.05, "Vertical speed should be clipped, vy={}", velocity.y);
        assert!(position.x > 0.1, "Should keep sliding along the floor");
    }

    #[test]
    fn test_slide_move_with_wall() {
        let mut world = CollisionWorld::new();
        world.add_box(
            Vec3::new(5.5, 2.0, 0.0),
            Vec3::new(0.5, 2.0, 10.0),
            ContentFlags::SOLID,
        );

        let mut position = Vec3::new(0.0, 0.5, 0.0);
        let mut velocity = Vec3::new(10.0, 0.0, 5.0);

        slide_move(
            &world,
            &mut position,
            &mut velocity,
            TraceShape::CHARACTER,
            ContentFlags::MASK_BODY,
            0.5,
            4,
            OVERBOUNCE,
        );

        assert!(position.x < 5.0, "Position x={} should stop before the wall", position.x);
        assert!(position.z > 1.0, "Should slide along the wall, z={}", position.z);
    }
}
