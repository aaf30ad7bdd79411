//! Scene: primitive collection, acceleration structure and the radiance estimator.
//!
//! A scene is assembled with `SceneBuilder` and frozen by `build()`. After
//! that it is read-only, so `cast_ray` can run on any number of threads as
//! long as each caller brings its own random number generator.

use crate::bvh::{Bvh, SplitMethod};
use crate::config::TracerConfig;
use crate::{gen_f32, Color, Intersection, Material, Primitive, Ray};
use lux_math::Vec3;
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;

/// Slack allowed when deciding that a shadow ray reached the light point.
pub const SHADOW_EPSILON: f32 = 0.01;

/// Distance new rays are pushed off a surface along its normal.
pub const SPAWN_OFFSET: f32 = 1e-3;

/// Errors that can occur while building a scene.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Scene has no emissive surface area to sample lights from")]
    NoEmitters,

    #[error("Russian roulette probability must be in (0, 1], got {0}")]
    InvalidRussianRoulette(f32),

    #[error("BVH leaf size must be at least 1")]
    InvalidLeafSize,

    #[error("Primitive {index} has a non-finite area or bounding box")]
    DegeneratePrimitive { index: usize },
}

/// How the scene answers nearest-hit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceleration {
    /// Test every primitive for every ray.
    Linear,
    /// Bounding volume hierarchy.
    Bvh {
        max_prims_in_node: usize,
        split: SplitMethod,
    },
}

impl Default for Acceleration {
    fn default() -> Self {
        Acceleration::Bvh {
            max_prims_in_node: 1,
            split: SplitMethod::Naive,
        }
    }
}

/// Nearest hit found by the linear search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    /// Distance along the ray
    pub distance: f32,
    /// Index of the hit primitive in the searched slice
    pub primitive: usize,
    /// Primitive-local sub index
    pub index: u32,
}

/// A point sampled on the scene's emissive surfaces.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub coords: Vec3,
    /// Outward unit normal of the light at `coords`
    pub normal: Vec3,
    /// Emitted radiance
    pub emit: Color,
    /// Area-measure density over the union of all emitters
    pub pdf: f32,
    /// Index of the emitter that produced the point
    pub primitive: usize,
}

enum Accelerator {
    Linear(Vec<Arc<dyn Primitive>>),
    Bvh(Bvh<Arc<dyn Primitive>>),
}

/// Collects primitives and settings, then builds an immutable `Scene`.
pub struct SceneBuilder {
    primitives: Vec<Arc<dyn Primitive>>,
    max_depth: u32,
    russian_roulette: f32,
    acceleration: Acceleration,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBuilder {
    /// Create an empty builder with default settings.
    pub fn new() -> Self {
        Self {
            primitives: Vec::new(),
            max_depth: 5,
            russian_roulette: 0.8,
            acceleration: Acceleration::default(),
        }
    }

    /// Create a builder with the settings from a tracer config.
    pub fn from_config(config: &TracerConfig) -> Self {
        Self::new()
            .with_max_depth(config.max_depth)
            .with_russian_roulette(config.russian_roulette)
            .with_acceleration(config.acceleration())
    }

    /// Add a primitive.
    pub fn add(mut self, primitive: impl Primitive + 'static) -> Self {
        self.push(primitive);
        self
    }

    /// Add a primitive through a mutable reference.
    pub fn push(&mut self, primitive: impl Primitive + 'static) {
        self.primitives.push(Arc::new(primitive));
    }

    /// Add a primitive that is shared with other owners.
    pub fn push_shared(&mut self, primitive: Arc<dyn Primitive>) {
        self.primitives.push(primitive);
    }

    /// Set the deepest recursion level that still contributes radiance.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the probability that a path continues past each vertex.
    pub fn with_russian_roulette(mut self, probability: f32) -> Self {
        self.russian_roulette = probability;
        self
    }

    pub fn with_acceleration(mut self, acceleration: Acceleration) -> Self {
        self.acceleration = acceleration;
        self
    }

    /// Number of primitives added so far.
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Validate the setup and build the acceleration structure.
    pub fn build(self) -> Result<Scene, SceneError> {
        let rr = self.russian_roulette;
        if !(rr > 0.0 && rr <= 1.0) {
            return Err(SceneError::InvalidRussianRoulette(rr));
        }

        for (index, p) in self.primitives.iter().enumerate() {
            let bbox = p.bounding_box();
            let corners_finite = [bbox.x, bbox.y, bbox.z]
                .iter()
                .all(|i| i.min.is_finite() && i.max.is_finite());
            if !p.area().is_finite() || p.area() < 0.0 || !corners_finite {
                return Err(SceneError::DegeneratePrimitive { index });
            }
        }

        let emitters: Vec<usize> = self
            .primitives
            .iter()
            .enumerate()
            .filter(|(_, p)| p.has_emit() && p.area() > 0.0)
            .map(|(i, _)| i)
            .collect();
        let total_emit_area: f32 = emitters.iter().map(|&i| self.primitives[i].area()).sum();
        if total_emit_area <= 0.0 {
            return Err(SceneError::NoEmitters);
        }

        if self.max_depth == 0 {
            log::warn!("max_depth is 0: only direct lighting will be computed");
        }

        let primitive_count = self.primitives.len();
        let accelerator = match self.acceleration {
            Acceleration::Linear => Accelerator::Linear(self.primitives),
            Acceleration::Bvh {
                max_prims_in_node,
                split,
            } => {
                if max_prims_in_node == 0 {
                    return Err(SceneError::InvalidLeafSize);
                }
                log::info!("Generating BVH ({:?} split)...", split);
                let start = std::time::Instant::now();
                let bvh = Bvh::new(self.primitives, max_prims_in_node, split);
                log::info!(
                    "BVH built in {:?}: {} primitives, depth {}",
                    start.elapsed(),
                    bvh.len(),
                    bvh.depth()
                );
                Accelerator::Bvh(bvh)
            }
        };

        log::info!(
            "Scene: {} primitives, {} emitters, emissive area {:.4}, max depth {}, russian roulette {}",
            primitive_count,
            emitters.len(),
            total_emit_area,
            self.max_depth,
            rr
        );

        Ok(Scene {
            accelerator,
            emitters,
            total_emit_area,
            max_depth: self.max_depth,
            russian_roulette: rr,
        })
    }
}

/// An immutable scene ready for rendering.
pub struct Scene {
    accelerator: Accelerator,
    /// Indices of emissive primitives, in registration order
    emitters: Vec<usize>,
    total_emit_area: f32,
    max_depth: u32,
    russian_roulette: f32,
}

impl Scene {
    /// All primitives, in registration order.
    pub fn primitives(&self) -> &[Arc<dyn Primitive>] {
        match &self.accelerator {
            Accelerator::Linear(primitives) => primitives.as_slice(),
            Accelerator::Bvh(bvh) => bvh.primitives(),
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn russian_roulette(&self) -> f32 {
        self.russian_roulette
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    /// Combined surface area of all emissive primitives.
    pub fn total_emit_area(&self) -> f32 {
        self.total_emit_area
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self.accelerator, Accelerator::Bvh(_))
    }

    /// Nearest intersection of a ray with the scene.
    pub fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        match &self.accelerator {
            Accelerator::Bvh(bvh) => bvh.intersect(ray),
            Accelerator::Linear(primitives) => match Self::trace(ray, primitives.as_slice()) {
                Some(hit) => primitives[hit.primitive]
                    .intersection(ray)
                    .with_primitive(hit.primitive),
                None => Intersection::miss(),
            },
        }
    }

    /// Brute-force nearest hit over `primitives`.
    ///
    /// Ties keep the earliest primitive.
    pub fn trace<P: Primitive>(ray: &Ray, primitives: &[P]) -> Option<TraceHit> {
        let mut nearest: Option<TraceHit> = None;
        for (k, primitive) in primitives.iter().enumerate() {
            if let Some(hit) = primitive.intersect(ray) {
                if nearest.map_or(true, |n| hit.distance < n.distance) {
                    nearest = Some(TraceHit {
                        distance: hit.distance,
                        primitive: k,
                        index: hit.index,
                    });
                }
            }
        }
        nearest
    }

    /// Draw a point uniformly over the combined area of all emitters.
    pub fn sample_light(&self, rng: &mut dyn RngCore) -> LightSample {
        let primitives = self.primitives();
        let u = gen_f32(rng) * self.total_emit_area;

        // The last emitter absorbs any rounding in the running sum
        let mut chosen = self.emitters[self.emitters.len() - 1];
        let mut running = 0.0;
        for &i in &self.emitters {
            running += primitives[i].area();
            if u <= running {
                chosen = i;
                break;
            }
        }

        let light = &primitives[chosen];
        let sample = light.sample(rng);
        LightSample {
            coords: sample.coords,
            normal: sample.normal,
            emit: sample.emit,
            pdf: sample.pdf * light.area() / self.total_emit_area,
            primitive: chosen,
        }
    }

    /// Radiance arriving along a camera ray.
    pub fn radiance(&self, ray: &Ray, rng: &mut dyn RngCore) -> Color {
        self.cast_ray(ray, 0, rng)
    }

    /// Estimate the radiance travelling back along `ray`.
    ///
    /// `depth` is the number of bounces already taken; anything deeper than
    /// `max_depth` contributes nothing.
    pub fn cast_ray(&self, ray: &Ray, depth: u32, rng: &mut dyn RngCore) -> Color {
        if depth > self.max_depth {
            return Color::ZERO;
        }

        let inter = self.intersect(ray);
        if !inter.happened {
            return Color::ZERO;
        }

        let wo = -ray.direction();

        // Paths end on a light; the back of an emitter is dark
        if inter.is_emissive() {
            return inter.emitted(wo);
        }

        let Some(material) = inter.material else {
            return Color::ZERO;
        };

        let n = inter.facing_normal(wo);
        let origin = inter.coords + n * SPAWN_OFFSET;

        let direct = self.direct_light(origin, n, wo, material, rng);
        let indirect = self.indirect_light(origin, n, wo, material, depth, rng);

        direct + indirect
    }

    /// Next-event estimate: one light sample with a shadow ray.
    fn direct_light(
        &self,
        origin: Vec3,
        n: Vec3,
        wo: Vec3,
        material: &dyn Material,
        rng: &mut dyn RngCore,
    ) -> Color {
        let light = self.sample_light(rng);

        let to_light = light.coords - origin;
        let dist_sq = to_light.length_squared();
        if !(dist_sq > 0.0) || !(light.pdf > 0.0) || !light.pdf.is_finite() {
            return Color::ZERO;
        }
        let dist = dist_sq.sqrt();
        let ws = to_light / dist;

        let cos_surface = n.dot(ws);
        let cos_light = light.normal.dot(-ws);
        if cos_surface <= 0.0 || cos_light <= 0.0 {
            return Color::ZERO;
        }

        // Anything hit clearly before the light point blocks it
        let shadow = self.intersect(&Ray::new(origin, ws));
        if !shadow.happened || shadow.distance < dist - SHADOW_EPSILON {
            return Color::ZERO;
        }

        light.emit * material.eval(ws, wo, n) * cos_surface * cos_light / (dist_sq * light.pdf)
    }

    /// Indirect estimate: one material-sampled bounce under Russian roulette.
    fn indirect_light(
        &self,
        origin: Vec3,
        n: Vec3,
        wo: Vec3,
        material: &dyn Material,
        depth: u32,
        rng: &mut dyn RngCore,
    ) -> Color {
        if gen_f32(rng) >= self.russian_roulette {
            return Color::ZERO;
        }

        let wi = material.sample(wo, n, rng);
        let pdf = material.pdf(wi, wo, n);
        let cos = n.dot(wi);
        if !(pdf > 0.0) || !pdf.is_finite() || cos <= 0.0 {
            return Color::ZERO;
        }

        let incoming = self.cast_ray(&Ray::new(origin, wi), depth + 1, rng);
        incoming * material.eval(wi, wo, n) * cos / (pdf * self.russian_roulette)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Diffuse, DiffuseLight, Quad, Sphere};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grey() -> Arc<dyn Material> {
        Arc::new(Diffuse::new(Color::splat(0.5)))
    }

    fn light(strength: f32) -> Arc<dyn Material> {
        Arc::new(DiffuseLight::new(Color::splat(strength)))
    }

    /// Floor at y=0 lit by a 2x2 downward-facing quad light at y=2.
    fn lit_floor() -> SceneBuilder {
        SceneBuilder::new()
            .add(Quad::new(
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(0.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 0.0),
                grey(),
            ))
            .add(Quad::new(
                Vec3::new(-1.0, 2.0, -1.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 2.0),
                light(4.0),
            ))
    }

    #[test]
    fn test_build_rejects_scene_without_lights() {
        let result = SceneBuilder::new()
            .add(Sphere::new(Vec3::ZERO, 1.0, grey()))
            .build();
        assert_eq!(result.err(), Some(SceneError::NoEmitters));

        assert_eq!(SceneBuilder::new().build().err(), Some(SceneError::NoEmitters));
    }

    #[test]
    fn test_build_rejects_bad_settings() {
        let result = lit_floor().with_russian_roulette(0.0).build();
        assert_eq!(result.err(), Some(SceneError::InvalidRussianRoulette(0.0)));

        let result = lit_floor().with_russian_roulette(1.5).build();
        assert!(matches!(result, Err(SceneError::InvalidRussianRoulette(_))));

        let result = lit_floor()
            .with_acceleration(Acceleration::Bvh {
                max_prims_in_node: 0,
                split: SplitMethod::Naive,
            })
            .build();
        assert_eq!(result.err(), Some(SceneError::InvalidLeafSize));
    }

    #[test]
    fn test_build_rejects_degenerate_primitive() {
        let result = lit_floor()
            .add(Sphere::new(Vec3::splat(f32::NAN), 1.0, grey()))
            .build();
        assert_eq!(result.err(), Some(SceneError::DegeneratePrimitive { index: 2 }));
    }

    #[test]
    fn test_intersect_reports_nearest() {
        let scene = lit_floor().build().unwrap();

        let down = Ray::new(Vec3::new(3.0, 1.0, 3.0), -Vec3::Y);
        let rec = scene.intersect(&down);
        assert!(rec.happened);
        assert_eq!(rec.primitive, 0);
        assert!((rec.distance - 1.0).abs() < 1e-5);
        assert_eq!(rec.emit, Color::ZERO);

        let up = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let rec = scene.intersect(&up);
        assert_eq!(rec.primitive, 1);
        assert_eq!(rec.emit, Color::splat(4.0));
    }

    #[test]
    fn test_miss_returns_zero() {
        for acceleration in [Acceleration::Linear, Acceleration::default()] {
            let scene = lit_floor().with_acceleration(acceleration).build().unwrap();
            let mut rng = StdRng::seed_from_u64(1);
            let sky = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::Y);

            assert!(!scene.intersect(&sky).happened);
            assert_eq!(scene.cast_ray(&sky, 0, &mut rng), Color::ZERO);
        }
    }

    #[test]
    fn test_depth_cap_returns_exact_zero() {
        let scene = lit_floor().with_max_depth(3).build().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let at_light = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let at_floor = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);

        for depth in [4, 5, 100] {
            assert_eq!(scene.cast_ray(&at_light, depth, &mut rng), Color::ZERO);
            assert_eq!(scene.cast_ray(&at_floor, depth, &mut rng), Color::ZERO);
        }
    }

    #[test]
    fn test_ray_on_light_returns_emission_at_any_depth() {
        let scene = lit_floor().with_max_depth(5).build().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let at_light = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);

        assert_eq!(scene.radiance(&at_light, &mut rng), Color::splat(4.0));
        for depth in 1..=5 {
            assert_eq!(scene.cast_ray(&at_light, depth, &mut rng), Color::splat(4.0));
        }
    }

    #[test]
    fn test_back_of_light_is_dark() {
        // The light quad faces down; look at it from above
        for acceleration in [Acceleration::Linear, Acceleration::default()] {
            let scene = lit_floor().with_acceleration(acceleration).build().unwrap();
            let mut rng = StdRng::seed_from_u64(8);
            let from_above = Ray::new(Vec3::new(0.0, 3.0, 0.0), -Vec3::Y);

            let rec = scene.intersect(&from_above);
            assert_eq!(rec.primitive, 1);
            assert!(rec.is_emissive());
            for depth in 0..3 {
                assert_eq!(scene.cast_ray(&from_above, depth, &mut rng), Color::ZERO);
            }
        }
    }

    #[test]
    fn test_single_emitter_is_always_selected() {
        let scene = lit_floor().build().unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        assert_eq!(scene.emitter_count(), 1);
        assert!((scene.total_emit_area() - 4.0).abs() < 1e-6);
        for _ in 0..1000 {
            let sample = scene.sample_light(&mut rng);
            assert_eq!(sample.primitive, 1);
            assert!((sample.pdf - 0.25).abs() < 1e-6);
            assert!((sample.coords.y - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_light_selection_is_area_weighted() {
        // Emitters of area 1 and 3: expect a 1:3 split
        let scene = SceneBuilder::new()
            .add(Quad::new(Vec3::ZERO, Vec3::X, Vec3::Z, light(1.0)))
            .add(Quad::new(
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::X * 3.0,
                Vec3::Z,
                light(1.0),
            ))
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let draws = 20_000;
        let mut small = 0;
        for _ in 0..draws {
            let sample = scene.sample_light(&mut rng);
            // Combined density is uniform over the union
            assert!((sample.pdf - 0.25).abs() < 1e-5);
            if sample.primitive == 0 {
                small += 1;
            }
        }
        let fraction = small as f32 / draws as f32;
        assert!((fraction - 0.25).abs() < 0.015, "fraction {fraction}");
    }

    #[test]
    fn test_direct_light_on_floor_below_light() {
        // With max_depth 0 only the direct estimate at the first hit remains
        let scene = lit_floor()
            .with_russian_roulette(1.0)
            .with_max_depth(0)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);

        let samples = 20_000;
        let mut sum = Color::ZERO;
        for _ in 0..samples {
            sum += scene.radiance(&ray, &mut rng);
        }
        let mean = sum / samples as f32;

        // Form factor of a 2x2 square at height 2 seen from the point below its
        // centre: four 1x1 rectangles with a corner straight above.
        let x = 0.5_f32 / (1.0_f32 + 0.25).sqrt();
        let form_factor = 4.0 * x * x.atan() / std::f32::consts::PI;
        // L = albedo * Le * F for a Lambertian receiver
        let expected = 0.5 * 4.0 * form_factor;
        assert!(
            (mean.x - expected).abs() < 0.05 * expected,
            "mean {} expected {}",
            mean.x,
            expected
        );
        assert!((mean.x - mean.y).abs() < 1e-6);
    }

    #[test]
    fn test_occluder_blocks_direct_light() {
        let scene = lit_floor()
            .add(Quad::new(
                Vec3::new(-3.0, 1.0, -3.0),
                Vec3::new(0.0, 0.0, 6.0),
                Vec3::new(6.0, 0.0, 0.0),
                grey(),
            ))
            .with_max_depth(0)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let ray = Ray::new(Vec3::new(0.0, 0.5, 0.0), -Vec3::Y);

        for _ in 0..200 {
            assert_eq!(scene.radiance(&ray, &mut rng), Color::ZERO);
        }
    }

    #[test]
    fn test_trace_matches_intersect() {
        let scene = lit_floor()
            .add(Sphere::new(Vec3::new(0.0, 0.5, 0.0), 0.25, grey()))
            .build()
            .unwrap();

        for origin in [Vec3::new(0.0, 1.5, 0.0), Vec3::new(2.0, 1.0, 2.0)] {
            let ray = Ray::new(origin, -Vec3::Y);
            let linear = Scene::trace(&ray, scene.primitives()).expect("linear hit");
            let accelerated = scene.intersect(&ray);
            assert_eq!(linear.primitive, accelerated.primitive);
            assert!((linear.distance - accelerated.distance).abs() < 1e-5);
        }
    }
}
