//! Collision world containing all static and moving geometry.
//!
//! Brushes are parry3d shapes placed with a translation. Platform-driven
//! brushes are moved by the host each step through [`CollisionWorld::set_brush_center`].

use glam::Vec3;
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::query::{
    cast_shapes, contact, intersection_test, Contact, Ray, ShapeCastHit, ShapeCastOptions,
};
use parry3d::shape::SharedShape;
use serde::{Deserialize, Serialize};

use crate::platform::PlatformId;
use crate::surface::SurfaceProperties;

use super::flags::ContentFlags;
use super::trace::{TraceResult, TraceShape};

/// Gap kept between a swept shape and what it hits. Penetration shallower
/// than this counts as touching, not overlapping.
pub const CONTACT_SKIN: f32 = 1e-3;

/// Impacts this close along the sweep (meters) are a tie.
const TIE_DISTANCE: f32 = 1e-4;

/// Stable handle to a brush in a [`CollisionWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrushId(pub u32);

impl std::fmt::Display for BrushId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "brush#{}", self.0)
    }
}

/// A piece of collision geometry in the world.
#[derive(Debug, Clone)]
pub struct CollisionBrush {
    pub id: BrushId,
    pub shape: SharedShape,
    /// Position in world space.
    pub transform: Isometry<Real>,
    /// Content flags (solid, trigger, jump pad).
    pub contents: ContentFlags,
    /// Traction/damping of the top surface, if it differs from the default.
    pub surface: Option<SurfaceProperties>,
    /// Platform that carries this brush.
    pub platform: Option<PlatformId>,
}

impl CollisionBrush {
    /// World-space center of the brush.
    pub fn center(&self) -> Vec3 {
        let t = self.transform.translation;
        Vec3::new(t.x, t.y, t.z)
    }
}

/// The collision world containing all geometry.
#[derive(Debug, Default)]
pub struct CollisionWorld {
    brushes: Vec<CollisionBrush>,
    next_id: u32,
}

impl CollisionWorld {
    /// Create an empty collision world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis-aligned box to the world.
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3, contents: ContentFlags) -> BrushId {
        let id = BrushId(self.next_id);
        self.next_id += 1;

        let shape = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);
        self.brushes.push(CollisionBrush {
            id,
            shape,
            transform: to_isometry(center),
            contents,
            surface: None,
            platform: None,
        });

        id
    }

    /// Attach surface properties to a brush. Returns false for unknown ids.
    pub fn set_surface(&mut self, id: BrushId, surface: SurfaceProperties) -> bool {
        match self.brush_mut(id) {
            Some(brush) => {
                brush.surface = Some(surface.sanitized());
                true
            }
            None => false,
        }
    }

    /// Mark a brush as carried by a platform.
    pub fn link_platform(&mut self, id: BrushId, platform: PlatformId) -> bool {
        match self.brush_mut(id) {
            Some(brush) => {
                brush.platform = Some(platform);
                true
            }
            None => false,
        }
    }

    /// Teleport a brush. Used for platform-driven geometry.
    pub fn set_brush_center(&mut self, id: BrushId, center: Vec3) -> bool {
        match self.brush_mut(id) {
            Some(brush) => {
                brush.transform = to_isometry(center);
                true
            }
            None => false,
        }
    }

    pub fn brush(&self, id: BrushId) -> Option<&CollisionBrush> {
        self.brushes.iter().find(|brush| brush.id == id)
    }

    fn brush_mut(&mut self, id: BrushId) -> Option<&mut CollisionBrush> {
        self.brushes.iter_mut().find(|brush| brush.id == id)
    }

    /// Surface properties of a brush, if it declares any.
    pub fn surface_of(&self, id: BrushId) -> Option<SurfaceProperties> {
        self.brush(id).and_then(|brush| brush.surface)
    }

    /// Platform carrying a brush, if any.
    pub fn platform_of(&self, id: BrushId) -> Option<PlatformId> {
        self.brush(id).and_then(|brush| brush.platform)
    }

    /// All brushes carried by `platform`.
    pub fn brushes_linked_to(&self, platform: PlatformId) -> impl Iterator<Item = &CollisionBrush> {
        self.brushes
            .iter()
            .filter(move |brush| brush.platform == Some(platform))
    }

    /// Remove all collision geometry.
    pub fn clear(&mut self) {
        self.brushes.clear();
    }

    /// Get the number of collision brushes.
    pub fn brush_count(&self) -> usize {
        self.brushes.len()
    }

    /// Sweep a shape from `start` to `end`.
    ///
    /// `start` and `end` are shape origins (see [`TraceShape::center_offset`]).
    pub fn trace(&self, start: Vec3, end: Vec3, shape: TraceShape, mask: ContentFlags) -> TraceResult {
        let delta = end - start;
        let distance = delta.length();

        // No movement - just check if position is valid
        if distance < 0.0001 {
            return match self.first_overlap(start, shape, mask) {
                Some(brush) => {
                    let found = contact_at(brush, start, shape);
                    TraceResult {
                        fraction: 0.0,
                        end_position: start,
                        hit_normal: Some(found.as_ref().map_or(Vec3::Y, contact_normal)),
                        hit_point: Some(found.as_ref().map_or(start, contact_point)),
                        hit_contents: brush.contents,
                        hit_brush: Some(brush.id),
                        started_in_solid: true,
                        all_solid: true,
                    }
                }
                None => TraceResult::no_hit(start),
            };
        }

        self.sweep(start, end, shape, mask, delta / distance, distance)
    }

    /// Sweep a sphere along `direction` for `distance`. A zero radius
    /// degrades to a raycast.
    pub fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        distance: f32,
        mask: ContentFlags,
    ) -> TraceResult {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return TraceResult::no_hit(origin);
        }
        if radius <= 0.0 {
            return self.raycast(origin, dir, distance, mask);
        }

        self.trace(origin, origin + dir * distance.max(0.0), TraceShape::Sphere { radius }, mask)
    }

    /// Perform a raycast (point trace) through the world.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: ContentFlags,
    ) -> TraceResult {
        let dir = direction.normalize_or_zero();
        if dir.length_squared() < 0.5 || max_distance <= 0.0 {
            return TraceResult::no_hit(origin);
        }

        let ray = Ray::new(
            Point::new(origin.x, origin.y, origin.z),
            Vector::new(dir.x, dir.y, dir.z),
        );

        let mut closest_hit: Option<(f32, Vec3, &CollisionBrush)> = None;

        for brush in &self.brushes {
            if !mask.intersects(brush.contents) {
                continue;
            }

            let Some(toi) = brush.shape.cast_ray(&brush.transform, &ray, max_distance, true) else {
                continue;
            };

            let is_closer = closest_hit
                .as_ref()
                .map_or(true, |(dist, _, _)| toi < *dist);
            if toi <= max_distance && is_closer {
                closest_hit = Some((toi, hit_normal(&ray, toi, brush), brush));
            }
        }

        match closest_hit {
            Some((distance, normal, brush)) => {
                let end_position = origin + dir * distance;
                TraceResult {
                    fraction: distance / max_distance,
                    end_position,
                    hit_normal: Some(normal),
                    hit_point: Some(end_position),
                    hit_contents: brush.contents,
                    hit_brush: Some(brush.id),
                    started_in_solid: distance <= 0.0,
                    all_solid: false,
                }
            }
            None => TraceResult::no_hit(origin + dir * max_distance),
        }
    }

    /// Check if a shape at `position` overlaps geometry matching `mask` by
    /// more than [`CONTACT_SKIN`]. Works at any depth.
    pub fn point_in_solid(&self, position: Vec3, shape: TraceShape, mask: ContentFlags) -> bool {
        self.first_overlap(position, shape, mask).is_some()
    }

    /// Brushes matching `mask` that the shape at `position` overlaps or touches.
    pub fn overlapping(&self, position: Vec3, shape: TraceShape, mask: ContentFlags) -> Vec<BrushId> {
        let test_shape = parry_shape(shape);
        let test_transform = to_isometry(position + shape.center_offset());

        self.brushes
            .iter()
            .filter(|brush| mask.intersects(brush.contents))
            .filter(|brush| {
                matches!(
                    intersection_test(
                        &test_transform,
                        test_shape.as_ref(),
                        &brush.transform,
                        brush.shape.as_ref(),
                    ),
                    Ok(true)
                )
            })
            .map(|brush| brush.id)
            .collect()
    }

    /// Push a shape out of overlapping geometry, leaving it [`CONTACT_SKIN`]
    /// clear. Returns the corrected position.
    pub fn resolve_penetration(&self, position: Vec3, shape: TraceShape, mask: ContentFlags) -> Vec3 {
        let test_shape = parry_shape(shape);
        let test_transform = to_isometry(position + shape.center_offset());

        let mut correction = Vec3::ZERO;

        for brush in &self.brushes {
            if !mask.intersects(brush.contents) {
                continue;
            }

            if let Ok(Some(found)) = contact(
                &test_transform,
                test_shape.as_ref(),
                &brush.transform,
                brush.shape.as_ref(),
                0.0,
            ) {
                let depth = -found.dist;
                if depth > 0.0 {
                    correction += contact_normal(&found) * (depth + CONTACT_SKIN);
                }
            }
        }

        position + correction
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    /// First brush the shape penetrates deeper than [`CONTACT_SKIN`].
    fn first_overlap(
        &self,
        position: Vec3,
        shape: TraceShape,
        mask: ContentFlags,
    ) -> Option<&CollisionBrush> {
        let test_shape = inset_shape(shape, CONTACT_SKIN);
        let test_transform = to_isometry(position + shape.center_offset());

        self.brushes
            .iter()
            .filter(|brush| mask.intersects(brush.contents))
            .find(|brush| {
                matches!(
                    intersection_test(
                        &test_transform,
                        test_shape.as_ref(),
                        &brush.transform,
                        brush.shape.as_ref(),
                    ),
                    Ok(true)
                )
            })
    }

    /// Swept trace: the earliest time of impact over every brush.
    ///
    /// Ties within [`TIE_DISTANCE`] go to the brush added first. Contacts the
    /// motion does not push into are ignored, so a body resting on a floor
    /// can slide along it.
    fn sweep(
        &self,
        start: Vec3,
        end: Vec3,
        shape: TraceShape,
        mask: ContentFlags,
        direction: Vec3,
        distance: f32,
    ) -> TraceResult {
        let start_in_solid = self.point_in_solid(start, shape, mask);

        let cast_shape = parry_shape(shape);
        let origin = to_isometry(start + shape.center_offset());
        let delta = end - start;
        let motion = Vector::new(delta.x, delta.y, delta.z);

        let mut closest: Option<(&CollisionBrush, ShapeCastHit, Vec3)> = None;
        for brush in self.brushes.iter().filter(|brush| mask.intersects(brush.contents)) {
            let Ok(Some(hit)) = cast_shapes(
                &origin,
                &motion,
                cast_shape.as_ref(),
                &brush.transform,
                &Vector::zeros(),
                brush.shape.as_ref(),
                cast_options(),
            ) else {
                continue;
            };

            let normal = impact_normal(brush, &hit, direction);
            if hit.time_of_impact <= 0.0 && direction.dot(normal) > -1e-4 {
                continue;
            }

            let is_closer = closest.as_ref().map_or(true, |(_, best, _)| {
                (hit.time_of_impact - best.time_of_impact) * distance < -TIE_DISTANCE
            });
            if is_closer {
                closest = Some((brush, hit, normal));
            }
        }

        let Some((brush, hit, normal)) = closest else {
            return TraceResult {
                started_in_solid: start_in_solid,
                ..TraceResult::no_hit(end)
            };
        };

        // Stop CONTACT_SKIN short of the surface, measured along its normal
        let approach = (-direction.dot(normal)).max(1e-3);
        let travel = (hit.time_of_impact * distance - CONTACT_SKIN / approach).max(0.0);
        let fraction = (travel / distance).min(hit.time_of_impact);
        let end_position = start + delta * fraction;

        let witness = brush.transform * hit.witness2;

        TraceResult {
            fraction,
            end_position,
            hit_normal: Some(normal),
            hit_point: Some(Vec3::new(witness.x, witness.y, witness.z)),
            hit_contents: brush.contents,
            hit_brush: Some(brush.id),
            started_in_solid: start_in_solid,
            all_solid: start_in_solid && fraction < 0.001,
        }
    }
}

fn to_isometry(center: Vec3) -> Isometry<Real> {
    Isometry::translation(center.x, center.y, center.z)
}

/// Create a parry3d shape from a [`TraceShape`].
fn parry_shape(shape: TraceShape) -> SharedShape {
    match shape {
        TraceShape::Capsule { radius, height } => {
            // Parry capsule is defined by half-height of the cylinder part
            let cylinder_half_height = (height - 2.0 * radius).max(0.0) / 2.0;
            SharedShape::capsule_y(cylinder_half_height, radius)
        }
        TraceShape::Sphere { radius } => SharedShape::ball(radius.max(0.001)),
        TraceShape::Point => SharedShape::ball(0.001),
    }
}

/// Penetration contact between a brush and a shape at `position`.
fn contact_at(brush: &CollisionBrush, position: Vec3, shape: TraceShape) -> Option<Contact> {
    let test_shape = parry_shape(shape);
    let test_transform = to_isometry(position + shape.center_offset());
    contact(
        &test_transform,
        test_shape.as_ref(),
        &brush.transform,
        brush.shape.as_ref(),
        0.0,
    )
    .ok()
    .flatten()
}

fn cast_options() -> ShapeCastOptions {
    ShapeCastOptions {
        max_time_of_impact: 1.0,
        target_distance: 0.0,
        stop_at_penetration: false,
        compute_impact_geometry_on_penetration: true,
    }
}

/// [`parry_shape`] with its radius shrunk by `inset`.
fn inset_shape(shape: TraceShape, inset: f32) -> SharedShape {
    match shape {
        TraceShape::Capsule { radius, height } => {
            let cylinder_half_height = (height - 2.0 * radius).max(0.0) / 2.0;
            SharedShape::capsule_y(cylinder_half_height, (radius - inset).max(0.001))
        }
        TraceShape::Sphere { radius } => SharedShape::ball((radius - inset).max(0.001)),
        TraceShape::Point => SharedShape::ball(0.001),
    }
}

/// World-space normal on the brush at a shape-cast impact.
fn impact_normal(brush: &CollisionBrush, hit: &ShapeCastHit, direction: Vec3) -> Vec3 {
    let n = brush.transform.rotation * hit.normal2.into_inner();
    let normal = Vec3::new(n.x, n.y, n.z).normalize_or_zero();
    if normal != Vec3::ZERO {
        return normal;
    }
    let horizontal = Vec3::new(-direction.x, 0.0, -direction.z);
    if horizontal.length_squared() > 0.1 {
        horizontal.normalize()
    } else {
        Vec3::Y
    }
}

/// Normal pointing out of the brush, toward the queried shape.
fn contact_normal(found: &Contact) -> Vec3 {
    let n = found.normal2;
    Vec3::new(n.x, n.y, n.z)
}

fn contact_point(found: &Contact) -> Vec3 {
    let p = found.point2;
    Vec3::new(p.x, p.y, p.z)
}

/// Surface normal where a ray enters a brush.
fn hit_normal(ray: &Ray, toi: f32, brush: &CollisionBrush) -> Vec3 {
    let fallback = -Vec3::new(ray.dir.x, ray.dir.y, ray.dir.z).normalize_or_zero();
    brush
        .shape
        .cast_ray_and_get_normal(&brush.transform, ray, toi + 0.01, true)
        .map(|intersection| {
            let n = intersection.normal;
            Vec3::new(n.x, n.y, n.z).normalize_or_zero()
        })
        .filter(|normal| *normal != Vec3::ZERO)
        .unwrap_or(fallback)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();

        // Floor at y=0
        world.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(50.0, 0.5, 50.0),
            ContentFlags::SOLID,
        );

        // Wall at x=10
        world.add_box(
            Vec3::new(10.0, 2.5, 0.0),
            Vec3::new(0.5, 2.5, 10.0),
            ContentFlags::SOLID,
        );

        world
    }

    #[test]
    fn test_raycast_hit() {
        let world = create_test_world();

        let result = world.raycast(Vec3::new(0.0, 1.0, 0.0), Vec3::X, 100.0, ContentFlags::SOLID);

        assert!(result.hit_something());
        assert!((result.end_position.x - 9.5).abs() < 0.1);
        assert_eq!(result.hit_brush, Some(BrushId(1)));
        let normal = result.hit_normal.unwrap();
        assert!(normal.x < -0.9, "Wall normal should face -X, got {normal}");
    }

    #[test]
    fn test_raycast_miss() {
        let world = create_test_world();

        let result = world.raycast(Vec3::new(0.0, 1.0, 0.0), -Vec3::X, 100.0, ContentFlags::SOLID);

        assert!(!result.hit_something());
        assert_eq!(result.fraction, 1.0);
    }

    #[test]
    fn test_trace_capsule() {
        let world = create_test_world();

        let result = world.trace(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            TraceShape::CHARACTER,
            ContentFlags::SOLID,
        );

        assert!(result.hit_something());
        assert!(result.end_position.x < 9.5 - 0.3);
        assert!(!result.started_in_solid, "Resting on the floor is not overlapping");
    }

    #[test]
    fn test_sphere_cast_finds_floor() {
        let world = create_test_world();

        let result = world.sphere_cast(
            Vec3::new(0.0, 0.5, 0.0),
            0.2,
            -Vec3::Y,
            1.0,
            ContentFlags::MASK_GROUND,
        );

        assert!(result.hit_something());
        assert_eq!(result.hit_brush, Some(BrushId(0)));
        let normal = result.hit_normal.unwrap();
        assert!(normal.y > 0.9, "Floor normal should face up, got {normal}");
        let point = result.hit_point.unwrap();
        assert!(point.y.abs() < 0.01, "Contact should be on the floor top, got {point}");
    }

    #[test]
    fn test_point_in_solid() {
        let world = create_test_world();

        assert!(world.point_in_solid(Vec3::new(0.0, -0.25, 0.0), TraceShape::Point, ContentFlags::SOLID));
        assert!(!world.point_in_solid(Vec3::new(0.0, 1.0, 0.0), TraceShape::Point, ContentFlags::SOLID));
    }

    #[test]
    fn test_point_in_solid_at_any_depth() {
        let world = create_test_world();

        for depth in [0.07, 0.3, 0.99] {
            let position = Vec3::new(0.0, -depth, 0.0);
            assert!(
                world.point_in_solid(position, TraceShape::CHARACTER, ContentFlags::SOLID),
                "Capsule {depth} m into the floor should be in solid"
            );
            assert!(world.point_in_solid(position, TraceShape::Point, ContentFlags::SOLID));
        }
        assert!(!world.point_in_solid(Vec3::ZERO, TraceShape::CHARACTER, ContentFlags::SOLID));
    }

    #[test]
    fn test_fall_trace_stops_on_floor() {
        let world = create_test_world();

        // One 2 m step ends entirely below the 1 m thick floor
        let result = world.trace(
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(0.0, -1.5, 0.0),
            TraceShape::CHARACTER,
            ContentFlags::SOLID,
        );

        assert!(result.hit_something());
        assert_eq!(result.hit_brush, Some(BrushId(0)));
        assert!(
            (result.end_position.y - CONTACT_SKIN).abs() < 5e-4,
            "Should stop a skin above the floor, y={}",
            result.end_position.y
        );
        assert!(result.normal_or_up().y > 0.9);
        assert!(!result.started_in_solid);
    }

    #[test]
    fn test_trace_along_floor_is_clear() {
        let world = create_test_world();

        let result = world.trace(
            Vec3::new(0.0, CONTACT_SKIN, 0.0),
            Vec3::new(0.0, CONTACT_SKIN, -5.0),
            TraceShape::CHARACTER,
            ContentFlags::SOLID,
        );

        assert!(!result.hit_something(), "{result:?}");
        assert_eq!(result.end_position.z, -5.0);
    }

    #[test]
    fn test_coplanar_tie_goes_to_first_brush() {
        let mut world = CollisionWorld::new();
        let patch = world.add_box(
            Vec3::new(0.0, -0.05, 0.0),
            Vec3::new(2.0, 0.05, 2.0),
            ContentFlags::SOLID,
        );
        world.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(50.0, 0.5, 50.0),
            ContentFlags::SOLID,
        );

        let result = world.sphere_cast(
            Vec3::new(0.5, 0.15, 0.0),
            0.15,
            -Vec3::Y,
            0.3,
            ContentFlags::MASK_GROUND,
        );

        assert_eq!(result.hit_brush, Some(patch));
    }

    #[test]
    fn test_content_mask_filtering() {
        let mut world = CollisionWorld::new();

        world.add_box(
            Vec3::new(5.0, 1.0, 0.0),
            Vec3::new(0.5, 1.0, 5.0),
            ContentFlags::SOLID,
        );
        let trigger = world.add_box(
            Vec3::new(3.0, 1.0, 0.0),
            Vec3::new(0.5, 1.0, 5.0),
            ContentFlags::TRIGGER,
        );

        let result = world.raycast(Vec3::new(0.0, 1.0, 0.0), Vec3::X, 100.0, ContentFlags::SOLID);

        assert!(result.hit_something());
        assert!((result.end_position.x - 4.5).abs() < 0.1);

        let inside = world.overlapping(Vec3::new(3.0, 1.0, 0.0), TraceShape::Point, ContentFlags::TRIGGER);
        assert_eq!(inside, vec![trigger]);
    }

    #[test]
    fn test_moving_brush() {
        let mut world = CollisionWorld::new();
        let id = world.add_box(Vec3::ZERO, Vec3::splat(0.5), ContentFlags::SOLID);
        world.link_platform(id, PlatformId(3));
        world.set_surface(id, SurfaceProperties::ICE);

        assert!(world.set_brush_center(id, Vec3::new(0.0, 2.0, 0.0)));
        assert!(world.point_in_solid(Vec3::new(0.0, 2.0, 0.0), TraceShape::Point, ContentFlags::SOLID));
        assert!(!world.point_in_solid(Vec3::ZERO, TraceShape::Point, ContentFlags::SOLID));

        assert_eq!(world.platform_of(id), Some(PlatformId(3)));
        assert_eq!(world.surface_of(id), Some(SurfaceProperties::ICE));
        assert_eq!(world.brushes_linked_to(PlatformId(3)).count(), 1);
        assert!(!world.set_brush_center(BrushId(99), Vec3::ZERO));
    }

    #[test]
    fn test_resolve_penetration_pushes_up() {
        let world = create_test_world();
        let shape = TraceShape::Sphere { radius: 0.5 };

        let resolved = world.resolve_penetration(Vec3::new(0.0, 0.3, 0.0), shape, ContentFlags::SOLID);
        assert!((resolved.y - 0.5).abs() < 0.01, "resolved = {resolved}");
    }
}
