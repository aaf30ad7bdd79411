//! Primitive trait: the capability set every shape offers to the scene.

use crate::{Color, Intersection};
use lux_math::{Aabb, Interval, Ray, Vec3};
use rand::RngCore;
use std::sync::Arc;

/// Hits closer than this are rejected to avoid self-intersection.
pub const HIT_EPSILON: f32 = 1e-4;

/// The ray parameter range primitives accept hits in.
#[inline]
pub fn hit_range() -> Interval {
    Interval::new(HIT_EPSILON, f32::INFINITY)
}

/// Distance-only result of a primitive intersection test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveHit {
    /// Distance along the ray
    pub distance: f32,
    /// Primitive-local sub index (triangle within a mesh, 0 otherwise)
    pub index: u32,
}

/// A point drawn on a primitive's surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSample {
    pub coords: Vec3,
    /// Outward unit normal at the sampled point
    pub normal: Vec3,
    /// Radiance emitted at the point
    pub emit: Color,
    /// Area-measure density of the point
    pub pdf: f32,
}

/// Trait for shapes that can be hit by rays and sampled as light sources.
pub trait Primitive: Send + Sync {
    /// Nearest hit of the ray within `hit_range()`, distance only.
    fn intersect(&self, ray: &Ray) -> Option<PrimitiveHit>;

    /// Full intersection record for the nearest hit.
    fn intersection(&self, ray: &Ray) -> Intersection<'_>;

    /// Get the axis-aligned bounding box of this primitive.
    fn bounding_box(&self) -> Aabb;

    /// Surface area in scene units squared.
    fn area(&self) -> f32;

    /// True if the primitive's material emits light.
    fn has_emit(&self) -> bool;

    /// Sample a point uniformly over the surface.
    fn sample(&self, rng: &mut dyn RngCore) -> SurfaceSample;
}

impl<P: Primitive + ?Sized> Primitive for Arc<P> {
    fn intersect(&self, ray: &Ray) -> Option<PrimitiveHit> {
        (**self).intersect(ray)
    }

    fn intersection(&self, ray: &Ray) -> Intersection<'_> {
        (**self).intersection(ray)
    }

    fn bounding_box(&self) -> Aabb {
        (**self).bounding_box()
    }

    fn area(&self) -> f32 {
        (**self).area()
    }

    fn has_emit(&self) -> bool {
        (**self).has_emit()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> SurfaceSample {
        (**self).sample(rng)
    }
}
