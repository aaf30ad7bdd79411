//! Material trait for surface reflectance and emission.
//!
//! Directions passed to a material are unit vectors pointing away from the
//! surface: `wo` back toward the viewer, `wi` toward the incoming light.

use crate::gen_f32;
use lux_math::Vec3;
use rand::RngCore;
use std::f32::consts::{FRAC_1_PI, PI};

/// Color type alias (linear RGB radiance or reflectance)
pub type Color = Vec3;

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Importance-sample an incoming direction `wi` given `wo` and the normal `n`.
    fn sample(&self, wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> Vec3;

    /// Solid-angle density with which `sample` produces `wi`.
    fn pdf(&self, wi: Vec3, wo: Vec3, n: Vec3) -> f32;

    /// BRDF value for the direction pair.
    fn eval(&self, wi: Vec3, wo: Vec3, n: Vec3) -> Color;

    /// Radiance emitted by the surface. Most materials return black.
    fn emission(&self) -> Color {
        Color::ZERO
    }

    /// True if the material emits light.
    fn has_emission(&self) -> bool {
        self.emission().length_squared() > 0.0
    }
}

/// Lambertian (diffuse) material with optional emission.
#[derive(Debug, Clone)]
pub struct Diffuse {
    albedo: Color,
    emission: Color,
}

impl Diffuse {
    /// Create a new diffuse material with the given albedo color.
    pub fn new(albedo: Color) -> Self {
        Self {
            albedo: albedo.clamp(Color::ZERO, Color::ONE),
            emission: Color::ZERO,
        }
    }

    /// Builder method to make the surface emissive.
    pub fn with_emission(mut self, emission: Color) -> Self {
        self.emission = emission.max(Color::ZERO);
        self
    }

    pub fn albedo(&self) -> Color {
        self.albedo
    }
}

impl Material for Diffuse {
    /// Uniform sampling of the hemisphere around `n`.
    fn sample(&self, _wo: Vec3, n: Vec3, rng: &mut dyn RngCore) -> Vec3 {
        let cos_theta = gen_f32(rng);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = 2.0 * PI * gen_f32(rng);
        let local = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
        to_world(local, n)
    }

    fn pdf(&self, wi: Vec3, _wo: Vec3, n: Vec3) -> f32 {
        if wi.dot(n) > 0.0 {
            0.5 * FRAC_1_PI
        } else {
            0.0
        }
    }

    fn eval(&self, wi: Vec3, wo: Vec3, n: Vec3) -> Color {
        if wi.dot(n) > 0.0 && wo.dot(n) > 0.0 {
            self.albedo * FRAC_1_PI
        } else {
            Color::ZERO
        }
    }

    fn emission(&self) -> Color {
        self.emission
    }
}

/// Diffuse light emitter. Lights reflect nothing.
#[derive(Debug, Clone)]
pub struct DiffuseLight {
    emit: Color,
}

impl DiffuseLight {
    /// Create a new diffuse light with the given emission color.
    pub fn new(emit: Color) -> Self {
        Self {
            emit: emit.max(Color::ZERO),
        }
    }
}

impl Material for DiffuseLight {
    fn sample(&self, _wo: Vec3, n: Vec3, _rng: &mut dyn RngCore) -> Vec3 {
        n
    }

    fn pdf(&self, _wi: Vec3, _wo: Vec3, _n: Vec3) -> f32 {
        0.0
    }

    fn eval(&self, _wi: Vec3, _wo: Vec3, _n: Vec3) -> Color {
        Color::ZERO
    }

    fn emission(&self) -> Color {
        self.emit
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Rotate a direction given in a frame where +Z is `n` into world space.
///
/// Builds the orthonormal basis from Duff et al., "Building an Orthonormal
/// Basis, Revisited" (2017).
pub(crate) fn to_world(local: Vec3, n: Vec3) -> Vec3 {
    let sign = 1.0_f32.copysign(n.z);
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    let tangent = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let bitangent = Vec3::new(b, sign + n.y * n.y * a, -n.y);
    (tangent * local.x + bitangent * local.y + n * local.z).normalize()
}
