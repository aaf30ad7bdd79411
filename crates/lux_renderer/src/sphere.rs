//! Sphere primitive for ray tracing.

use crate::primitive::{hit_range, PrimitiveHit, SurfaceSample};
use crate::{gen_f32, Intersection, Material, Primitive, Ray};
use lux_math::{Aabb, Vec3};
use rand::RngCore;
use std::f32::consts::PI;
use std::sync::Arc;

/// A sphere primitive.
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere.
    pub fn new(center: Vec3, radius: f32, material: Arc<dyn Material>) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::from_points(center - rvec, center + rvec);

        Self {
            center,
            radius,
            material,
            bbox,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Primitive for Sphere {
    fn intersect(&self, ray: &Ray) -> Option<PrimitiveHit> {
        // Direction is unit length, so the quadratic's `a` term is 1
        let oc = self.center - ray.origin();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();
        let range = hit_range();

        // Find the nearest root in the acceptable range
        let mut root = h - sqrtd;
        if !range.surrounds(root) {
            root = h + sqrtd;
            if !range.surrounds(root) {
                return None;
            }
        }

        Some(PrimitiveHit {
            distance: root,
            index: 0,
        })
    }

    fn intersection(&self, ray: &Ray) -> Intersection<'_> {
        match self.intersect(ray) {
            Some(hit) => {
                let p = ray.at(hit.distance);
                let outward_normal = (p - self.center).normalize();
                Intersection::hit(p, outward_normal, hit.distance, self.material.as_ref(), 0)
            }
            None => Intersection::miss(),
        }
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    fn has_emit(&self) -> bool {
        self.material.has_emission()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> SurfaceSample {
        let z = 1.0 - 2.0 * gen_f32(rng);
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = 2.0 * PI * gen_f32(rng);
        let normal = Vec3::new(r * phi.cos(), r * phi.sin(), z);

        SurfaceSample {
            coords: self.center + self.radius * normal,
            normal,
            emit: self.material.emission(),
            pdf: 1.0 / self.area(),
        }
    }
}
