//! Parallelogram primitive, used for walls and area lights.

use crate::primitive::{hit_range, PrimitiveHit, SurfaceSample};
use crate::{gen_f32, Intersection, Material, Primitive, Ray};
use lux_math::{Aabb, Vec3};
use rand::RngCore;
use std::sync::Arc;

/// A parallelogram spanned by edges `u` and `v` from corner `q`.
///
/// The outward normal is `u x v`, so the winding of the edges decides
/// which side an emissive quad lights.
pub struct Quad {
    q: Vec3,
    u: Vec3,
    v: Vec3,
    /// Unit normal
    normal: Vec3,
    /// Plane offset: normal . q
    d: f32,
    /// `n / (n . n)` for the unnormalized normal, used for planar coordinates
    w: Vec3,
    area: f32,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Quad {
    pub fn new(q: Vec3, u: Vec3, v: Vec3, material: Arc<dyn Material>) -> Self {
        let n = u.cross(v);
        let normal = n.normalize_or_zero();
        let n_len_sq = n.length_squared();
        let w = if n_len_sq > 0.0 { n / n_len_sq } else { Vec3::ZERO };

        let bbox = Aabb::surrounding(
            &Aabb::from_points(q, q + u + v),
            &Aabb::from_points(q + u, q + v),
        );

        Self {
            q,
            u,
            v,
            normal,
            d: normal.dot(q),
            w,
            area: n.length(),
            material,
            bbox,
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Planar coordinates (alpha, beta) of a point in the quad's plane.
    fn planar(&self, p: Vec3) -> (f32, f32) {
        let rel = p - self.q;
        (self.w.dot(rel.cross(self.v)), self.w.dot(self.u.cross(rel)))
    }
}

impl Primitive for Quad {
    fn intersect(&self, ray: &Ray) -> Option<PrimitiveHit> {
        let denom = self.normal.dot(ray.direction());

        // Ray is parallel to the plane
        if denom.abs() < 1e-8 {
            return None;
        }

        let t = (self.d - self.normal.dot(ray.origin())) / denom;
        if !hit_range().surrounds(t) {
            return None;
        }

        let (alpha, beta) = self.planar(ray.at(t));
        if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
            return None;
        }

        Some(PrimitiveHit { distance: t, index: 0 })
    }

    fn intersection(&self, ray: &Ray) -> Intersection<'_> {
        match self.intersect(ray) {
            Some(hit) => Intersection::hit(
                ray.at(hit.distance),
                self.normal,
                hit.distance,
                self.material.as_ref(),
                0,
            ),
            None => Intersection::miss(),
        }
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn has_emit(&self) -> bool {
        self.material.has_emission()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> SurfaceSample {
        let a = gen_f32(rng);
        let b = gen_f32(rng);

        SurfaceSample {
            coords: self.q + a * self.u + b * self.v,
            normal: self.normal,
            emit: self.material.emission(),
            pdf: 1.0 / self.area,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, Diffuse, DiffuseLight};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn floor() -> Quad {
        // 2x3 floor at y=0, normal +Y
        Quad::new(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(2.0, 0.0, 0.0),
            Arc::new(Diffuse::new(Color::splat(0.5))),
        )
    }

    #[test]
    fn test_quad_geometry() {
        let quad = floor();

        assert_eq!(quad.normal(), Vec3::Y);
        assert!((quad.area() - 6.0).abs() < 1e-6);
        assert!(quad.bounding_box().x.contains(2.0));
        assert!(quad.bounding_box().z.contains(3.0));
    }

    #[test]
    fn test_quad_hit_and_miss() {
        let quad = floor();

        let down = Ray::new(Vec3::new(1.0, 2.0, 1.5), -Vec3::Y);
        let hit = quad.intersect(&down).expect("should hit the floor");
        assert!((hit.distance - 2.0).abs() < 1e-5);

        // Hits from below too; the surface is two-sided for visibility
        let up = Ray::new(Vec3::new(1.0, -1.0, 1.5), Vec3::Y);
        assert!(quad.intersect(&up).is_some());

        let outside = Ray::new(Vec3::new(2.5, 2.0, 1.5), -Vec3::Y);
        assert!(quad.intersect(&outside).is_none());

        let parallel = Ray::new(Vec3::new(-1.0, 0.5, 1.0), Vec3::X);
        assert!(quad.intersect(&parallel).is_none());
    }

    #[test]
    fn test_quad_samples_cover_surface() {
        let quad = Quad::new(
            Vec3::new(-1.0, 4.0, -1.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
            Arc::new(DiffuseLight::new(Color::splat(10.0))),
        );
        let mut rng = StdRng::seed_from_u64(1);

        assert!(quad.has_emit());
        assert_eq!(quad.normal(), -Vec3::Y);
        for _ in 0..500 {
            let s = quad.sample(&mut rng);
            assert!((s.coords.y - 4.0).abs() < 1e-6);
            assert!(s.coords.x >= -1.0 && s.coords.x <= 1.0);
            assert!(s.coords.z >= -1.0 && s.coords.z <= 1.0);
            assert!((s.pdf - 0.25).abs() < 1e-6);
            assert_eq!(s.emit, Color::splat(10.0));
        }
    }
}
