//! Triangle and triangle mesh primitives.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection. A
//! `TriangleMesh` keeps its own BVH over its triangles and samples them
//! proportionally to area.

use crate::bvh::{Bvh, SplitMethod};
use crate::primitive::{hit_range, PrimitiveHit, SurfaceSample};
use crate::{gen_f32, Intersection, Material, Primitive, Ray};
use lux_math::{Aabb, Vec3};
use rand::RngCore;
use std::sync::Arc;

/// A triangle primitive.
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Pre-computed edges v1 - v0 and v2 - v0
    e1: Vec3,
    e2: Vec3,
    /// Pre-computed face normal (unit length, counter-clockwise winding)
    normal: Vec3,
    area: f32,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: Arc<dyn Material>) -> Self {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let cross = e1.cross(e2);

        Self {
            v0,
            v1,
            v2,
            e1,
            e2,
            normal: cross.normalize_or_zero(),
            area: 0.5 * cross.length(),
            material,
            bbox: Aabb::from_point_cloud(&[v0, v1, v2]),
        }
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }
}

impl Primitive for Triangle {
    fn intersect(&self, ray: &Ray) -> Option<PrimitiveHit> {
        let h = ray.direction().cross(self.e2);
        let a = self.e1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin() - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.e1);
        let v = f * ray.direction().dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.e2.dot(q);
        if !hit_range().surrounds(t) {
            return None;
        }

        Some(PrimitiveHit {
            distance: t,
            index: 0,
        })
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
        // Uniform barycentric coordinates via the square-root warp
        let su = gen_f32(rng).sqrt();
        let b1 = 1.0 - su;
        let b2 = gen_f32(rng) * su;

        SurfaceSample {
            coords: self.v0 + b1 * self.e1 + b2 * self.e2,
            normal: self.normal,
            emit: self.material.emission(),
            pdf: 1.0 / self.area,
        }
    }
}

/// An indexed triangle mesh sharing one material.
pub struct TriangleMesh {
    bvh: Bvh<Triangle>,
    /// Running sum of triangle areas, in BVH primitive order
    cumulative_area: Vec<f32>,
    area: f32,
    bbox: Aabb,
    material: Arc<dyn Material>,
}

impl TriangleMesh {
    /// Build a mesh from vertex positions and triangle indices.
    ///
    /// Every 3 indices form a triangle. Triangles referencing missing
    /// vertices are skipped with a warning.
    pub fn new(positions: &[Vec3], indices: &[u32], material: Arc<dyn Material>) -> Self {
        let mut triangles = Vec::with_capacity(indices.len() / 3);
        for (i, tri) in indices.chunks_exact(3).enumerate() {
            let vertex = |k: usize| positions.get(tri[k] as usize).copied();
            match (vertex(0), vertex(1), vertex(2)) {
                (Some(v0), Some(v1), Some(v2)) => {
                    triangles.push(Triangle::new(v0, v1, v2, material.clone()));
                }
                _ => log::warn!("Skipping triangle {} with out-of-range vertex index", i),
            }
        }

        let bvh = Bvh::new(triangles, 4, SplitMethod::Sah);

        let mut cumulative_area = Vec::with_capacity(bvh.len());
        let mut area = 0.0;
        for tri in bvh.primitives() {
            area += tri.area();
            cumulative_area.push(area);
        }

        let bbox = bvh.bounding_box();

        Self {
            bvh,
            cumulative_area,
            area,
            bbox,
            material,
        }
    }

    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.bvh.len()
    }

    pub fn triangles(&self) -> &[Triangle] {
        self.bvh.primitives()
    }
}

impl Primitive for TriangleMesh {
    fn intersect(&self, ray: &Ray) -> Option<PrimitiveHit> {
        self.bvh.nearest(ray).map(|(triangle, hit)| PrimitiveHit {
            distance: hit.distance,
            index: triangle as u32,
        })
    }

    fn intersection(&self, ray: &Ray) -> Intersection<'_> {
        let mut rec = self.bvh.intersect(ray);
        if rec.happened {
            rec.index = rec.primitive as u32;
            rec.primitive = 0;
        }
        rec
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
        let u = gen_f32(rng) * self.area;
        let chosen = self
            .cumulative_area
            .partition_point(|&sum| sum < u)
            .min(self.cumulative_area.len().saturating_sub(1));

        let mut sample = self.bvh.primitives()[chosen].sample(rng);
        // Triangle picked with probability area_k / area, point with 1 / area_k
        sample.pdf = 1.0 / self.area;
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, Diffuse};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grey() -> Arc<dyn Material> {
        Arc::new(Diffuse::new(Color::splat(0.5)))
    }

    fn xy_triangle() -> Triangle {
        // Triangle in XY plane at z=-1
        Triangle::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
            grey(),
        )
    }

    #[test]
    fn test_triangle_hit() {
        let tri = xy_triangle();
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

        let hit = tri.intersect(&ray).expect("ray should hit the triangle");
        assert!((hit.distance - 1.0).abs() < 0.001);

        let rec = tri.intersection(&ray);
        assert!((rec.coords - Vec3::new(0.0, 0.0, -1.0)).length() < 0.001);
        assert_eq!(rec.normal, Vec3::Z);
    }

    #[test]
    fn test_triangle_miss() {
        let tri = xy_triangle();

        // Ray pointing away
        assert!(tri.intersect(&Ray::new(Vec3::ZERO, Vec3::Z)).is_none());
        // Ray passing outside the edges
        assert!(tri
            .intersect(&Ray::new(Vec3::new(5.0, 0.0, 0.0), -Vec3::Z))
            .is_none());
    }

    #[test]
    fn test_triangle_area_and_samples() {
        let tri = xy_triangle();
        assert!((tri.area() - 2.0).abs() < 1e-6);

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let s = tri.sample(&mut rng);
            assert!((s.coords.z + 1.0).abs() < 1e-5);
            // Sampled point projects back onto the triangle
            let probe = Ray::new(s.coords + Vec3::Z, -Vec3::Z);
            assert!(tri.intersect(&probe).is_some());
            assert!((s.pdf - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mesh_reports_triangle_index() {
        // Two triangles forming the unit square at z=0
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mesh = TriangleMesh::new(&positions, &[0, 1, 2, 0, 2, 3], grey());

        assert_eq!(mesh.triangle_count(), 2);
        assert!((mesh.area() - 1.0).abs() < 1e-6);

        let lower = Ray::new(Vec3::new(0.75, 0.25, 1.0), -Vec3::Z);
        let upper = Ray::new(Vec3::new(0.25, 0.75, 1.0), -Vec3::Z);
        let a = mesh.intersect(&lower).expect("lower triangle hit");
        let b = mesh.intersect(&upper).expect("upper triangle hit");
        assert!((a.distance - 1.0).abs() < 1e-5);
        assert_ne!(a.index, b.index);

        let rec = mesh.intersection(&lower);
        assert!(rec.happened);
        assert_eq!(rec.index, a.index);
    }

    #[test]
    fn test_mesh_skips_bad_indices() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let mesh = TriangleMesh::new(&positions, &[0, 1, 2, 0, 1, 9], grey());

        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_mesh_samples_with_mesh_density() {
        let positions = [Vec3::ZERO, Vec3::X * 2.0, Vec3::Y, Vec3::new(2.0, 1.0, 0.0)];
        let mesh = TriangleMesh::new(&positions, &[0, 1, 2, 1, 3, 2], grey());
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..100 {
            let s = mesh.sample(&mut rng);
            assert!((s.pdf * mesh.area() - 1.0).abs() < 1e-5);
            assert!(s.coords.z.abs() < 1e-6);
        }
    }
}
