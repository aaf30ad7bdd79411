//! Image-sampling loop around the radiance estimator.
//!
//! Averages jittered camera rays per pixel and renders the image bucket by
//! bucket in parallel with rayon.

use crate::bucket::{generate_buckets, render_bucket, BucketResult};
use crate::{Camera, Color, RenderConfig, Scene};
use rand::RngCore;
use rayon::prelude::*;

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let to_byte = |c: f32| (255.0 * linear_to_gamma(c).clamp(0.0, 1.0)) as u8;
    [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
}

/// Average radiance over `samples` jittered rays through pixel (x, y).
///
/// Non-finite samples are dropped so a single bad path cannot poison a pixel.
pub fn render_pixel(
    camera: &Camera,
    scene: &Scene,
    x: u32,
    y: u32,
    samples: u32,
    rng: &mut dyn RngCore,
) -> Color {
    let mut pixel_color = Color::ZERO;

    for _ in 0..samples {
        let ray = camera.get_ray(x, y, rng);
        let radiance = scene.radiance(&ray, rng);
        if radiance.is_finite() {
            pixel_color += radiance;
        }
    }

    pixel_color / samples.max(1) as f32
}

/// Linear-radiance image buffer.
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; (width * height) as usize],
        }
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    /// Copy a rendered bucket into place.
    pub fn write_bucket(&mut self, result: &BucketResult) {
        let bucket = &result.bucket;
        for (i, color) in result.pixels.iter().enumerate() {
            let local_x = i as u32 % bucket.width;
            let local_y = i as u32 / bucket.width;
            self.set(bucket.x + local_x, bucket.y + local_y, *color);
        }
    }

    /// Mean of all pixels.
    pub fn average(&self) -> Color {
        if self.pixels.is_empty() {
            return Color::ZERO;
        }
        self.pixels.iter().copied().sum::<Color>() / self.pixels.len() as f32
    }

    /// Convert to gamma-corrected RGBA bytes (for display or saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| color_to_rgba(*c)).collect()
    }
}

/// Render the entire image, buckets in parallel.
///
/// Each bucket seeds its own generator from `config.seed`, so the result
/// does not depend on thread scheduling.
pub fn render(camera: &Camera, scene: &Scene, config: &RenderConfig) -> ImageBuffer {
    let buckets = generate_buckets(camera.image_width, camera.image_height, config.bucket_size);
    log::info!(
        "Rendering {}x{} @ {} spp in {} buckets",
        camera.image_width,
        camera.image_height,
        config.samples_per_pixel,
        buckets.len()
    );

    let results: Vec<BucketResult> = buckets
        .par_iter()
        .map(|bucket| BucketResult::new(*bucket, render_bucket(bucket, camera, scene, config)))
        .collect();

    let mut image = ImageBuffer::new(camera.image_width, camera.image_height);
    for result in &results {
        image.write_bucket(result);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenes::cornell_box;
    use crate::{SceneBuilder, Vec3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert_eq!(linear_to_gamma(-1.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_color_to_rgba_clamps() {
        assert_eq!(color_to_rgba(Color::new(4.0, 0.0, -1.0)), [255, 0, 0, 255]);
        assert_eq!(color_to_rgba(Color::splat(0.25)), [127, 127, 127, 255]);
    }

    #[test]
    fn test_render_pixel_sees_the_box() {
        let (builder, camera) = cornell_box();
        let scene = builder.build().unwrap();
        let camera = camera.with_resolution(16, 16);
        let mut rng = StdRng::seed_from_u64(42);

        let color = render_pixel(&camera, &scene, 8, 12, 8, &mut rng);
        assert!(color.length() > 0.0);
        assert!(color.is_finite());
    }

    #[test]
    fn test_render_is_reproducible() {
        let (builder, camera) = cornell_box();
        let scene = builder.build().unwrap();
        let camera = camera.with_resolution(12, 10);
        let config = RenderConfig {
            width: 12,
            height: 10,
            samples_per_pixel: 2,
            bucket_size: 4,
            seed: 9,
        };

        let a = render(&camera, &scene, &config);
        let b = render(&camera, &scene, &config);
        assert_eq!(a.pixels, b.pixels);
        assert_eq!(a.to_rgba().len(), 12 * 10 * 4);
        assert!(a.average().x > 0.0);
    }

    #[test]
    fn test_render_empty_view_is_black() {
        // Camera looking away from the only (light) primitive
        let scene = SceneBuilder::new()
            .add(crate::Sphere::new(
                Vec3::new(0.0, 0.0, 10.0),
                1.0,
                std::sync::Arc::new(crate::DiffuseLight::new(Color::ONE)),
            ))
            .build()
            .unwrap();
        let camera = Camera::new()
            .with_resolution(8, 8)
            .with_position(Vec3::ZERO, -Vec3::Z, Vec3::Y);

        let image = render(&camera, &scene, &RenderConfig::default());
        assert_eq!(image.average(), Color::ZERO);
    }
}
