//! Intersection record produced by ray queries.

use crate::{Color, Material};
use lux_math::Vec3;

/// Record of a ray-surface intersection.
///
/// When `happened` is false the geometric fields carry no meaning, but
/// `emit` is always zero on a miss so it can be read unconditionally.
#[derive(Clone, Copy)]
pub struct Intersection<'a> {
    /// Whether the ray hit anything
    pub happened: bool,
    /// Point of intersection
    pub coords: Vec3,
    /// Unit geometric normal, oriented outward
    pub normal: Vec3,
    /// Distance along the ray to the hit point
    pub distance: f32,
    /// Radiance emitted by the surface (zero for non-emissive surfaces)
    pub emit: Color,
    /// Material of the hit surface, borrowed from the primitive
    pub material: Option<&'a dyn Material>,
    /// Index of the hit primitive in the collection that was queried
    pub primitive: usize,
    /// Primitive-local sub index (e.g. the triangle within a mesh)
    pub index: u32,
}

impl<'a> Intersection<'a> {
    /// An intersection record for a ray that hit nothing.
    pub fn miss() -> Self {
        Self {
            happened: false,
            coords: Vec3::ZERO,
            normal: Vec3::ZERO,
            distance: f32::INFINITY,
            emit: Color::ZERO,
            material: None,
            primitive: 0,
            index: 0,
        }
    }

    /// A hit record for a surface point. Emission is taken from the material.
    pub fn hit(
        coords: Vec3,
        normal: Vec3,
        distance: f32,
        material: &'a dyn Material,
        index: u32,
    ) -> Self {
        Self {
            happened: true,
            coords,
            normal,
            distance,
            emit: material.emission(),
            material: Some(material),
            primitive: 0,
            index,
        }
    }

    /// Tag the record with the index of the primitive that produced it.
    pub fn with_primitive(mut self, primitive: usize) -> Self {
        self.primitive = primitive;
        self
    }

    /// Whether the hit surface emits light.
    pub fn is_emissive(&self) -> bool {
        self.happened && self.emit.length_squared() > 0.0
    }

    /// Radiance leaving the surface toward `toward`.
    ///
    /// Emitters radiate from their front side only, so this is zero when
    /// `toward` is behind the outward normal.
    pub fn emitted(&self, toward: Vec3) -> Color {
        if self.normal.dot(toward) > 0.0 {
            self.emit
        } else {
            Color::ZERO
        }
    }

    /// The normal flipped to lie in the same hemisphere as `toward`.
    ///
    /// Used for two-sided shading: `toward` is the direction back to
    /// the viewer.
    pub fn facing_normal(&self, toward: Vec3) -> Vec3 {
        if self.normal.dot(toward) < 0.0 {
            -self.normal
        } else {
            self.normal
        }
    }
}

impl Default for Intersection<'_> {
    fn default() -> Self {
        Self::miss()
    }
}

impl std::fmt::Debug for Intersection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Intersection")
            .field("happened", &self.happened)
            .field("coords", &self.coords)
            .field("normal", &self.normal)
            .field("distance", &self.distance)
            .field("emit", &self.emit)
            .field("primitive", &self.primitive)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
