//! Lux Renderer - CPU Path Tracing
//!
//! A Monte Carlo path tracer with next-event estimation: every shading point
//! takes one light sample plus one material-sampled bounce, and paths are
//! terminated by Russian roulette.
//!
//! Scenes are assembled with [`SceneBuilder`], frozen into an immutable
//! [`Scene`], and rendered bucket by bucket with [`render`].

mod bucket;
mod bvh;
mod camera;
mod config;
mod intersection;
mod material;
mod primitive;
mod quad;
mod renderer;
mod scene;
mod sphere;
mod triangle;
pub mod scenes;

pub use bucket::{generate_buckets, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
pub use bvh::{Bvh, SplitMethod};
pub use camera::Camera;
pub use config::{ConfigError, LuxConfig, RenderConfig, TracerConfig};
pub use intersection::Intersection;
pub use material::{Color, Diffuse, DiffuseLight, Material};
pub use primitive::{Primitive, PrimitiveHit, SurfaceSample, HIT_EPSILON};
pub use quad::Quad;
pub use renderer::{color_to_rgba, linear_to_gamma, render, render_pixel, ImageBuffer};
pub use scene::{
    Acceleration, LightSample, Scene, SceneBuilder, SceneError, TraceHit, SHADOW_EPSILON,
    SPAWN_OFFSET,
};
pub use scenes::{cornell_box, cornell_box_with};
pub use sphere::Sphere;
pub use triangle::{Triangle, TriangleMesh};

/// Re-export Vec3 and common math types from lux_math
pub use lux_math::{Aabb, Interval, Ray, Vec3};

use rand::{Rng, RngCore};

/// Uniform sample in [0, 1).
#[inline]
pub(crate) fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen()
}
