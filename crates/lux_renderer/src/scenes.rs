//! Built-in test scenes.

use crate::config::TracerConfig;
use crate::{Camera, Color, Diffuse, DiffuseLight, Material, Quad, SceneBuilder, Sphere, TriangleMesh};
use lux_math::Vec3;
use std::sync::Arc;

/// Cornell box with default tracer settings.
///
/// See [`cornell_box_with`].
pub fn cornell_box() -> (SceneBuilder, Camera) {
    cornell_box_with(&TracerConfig::default())
}

/// Cornell box: a 2x2x2 room open towards +Z, red wall on the left, green
/// wall on the right and a square light just under the ceiling.
///
/// Holds a tall block (triangle mesh) and a sphere. The camera looks into
/// the open side at 512x512.
pub fn cornell_box_with(config: &TracerConfig) -> (SceneBuilder, Camera) {
    let white: Arc<dyn Material> = Arc::new(Diffuse::new(Color::new(0.73, 0.73, 0.73)));
    let red: Arc<dyn Material> = Arc::new(Diffuse::new(Color::new(0.65, 0.05, 0.05)));
    let green: Arc<dyn Material> = Arc::new(Diffuse::new(Color::new(0.12, 0.45, 0.15)));
    let light: Arc<dyn Material> = Arc::new(DiffuseLight::new(Color::new(17.0, 12.0, 4.0)));

    let mut builder = SceneBuilder::from_config(config);

    // Floor, ceiling, back wall
    builder.push(Quad::new(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 2.0),
        white.clone(),
    ));
    builder.push(Quad::new(
        Vec3::new(-1.0, 2.0, -1.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 2.0),
        white.clone(),
    ));
    builder.push(Quad::new(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        white.clone(),
    ));

    // Side walls
    builder.push(Quad::new(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(0.0, 2.0, 0.0),
        Vec3::new(0.0, 0.0, 2.0),
        red,
    ));
    builder.push(Quad::new(
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(0.0, 2.0, 0.0),
        Vec3::new(0.0, 0.0, 2.0),
        green,
    ));

    // Light faces down (u x v = -Y)
    builder.push(Quad::new(
        Vec3::new(-0.25, 1.98, -0.25),
        Vec3::new(0.5, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.5),
        light,
    ));

    builder.push(block(
        Vec3::new(-0.7, 0.0, -0.6),
        Vec3::new(-0.1, 1.2, 0.0),
        white.clone(),
    ));
    builder.push(Sphere::new(Vec3::new(0.45, 0.35, 0.3), 0.35, white));

    let camera = Camera::new()
        .with_resolution(512, 512)
        .with_position(Vec3::new(0.0, 1.0, 3.8), Vec3::new(0.0, 1.0, 0.0), Vec3::Y)
        .with_fov(40.0);

    (builder, camera)
}

/// Axis-aligned box as a 12-triangle mesh.
fn block(min: Vec3, max: Vec3, material: Arc<dyn Material>) -> TriangleMesh {
    let positions = [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(max.x, max.y, max.z),
        Vec3::new(min.x, max.y, max.z),
    ];
    #[rustfmt::skip]
    let indices = [
        0, 2, 1, 0, 3, 2, // back
        4, 5, 6, 4, 6, 7, // front
        0, 1, 5, 0, 5, 4, // bottom
        3, 7, 6, 3, 6, 2, // top
        0, 4, 7, 0, 7, 3, // left
        1, 2, 6, 1, 6, 5, // right
    ];
    TriangleMesh::new(&positions, &indices, material)
}
