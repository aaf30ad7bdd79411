//! Tracer and render settings, loadable from JSON.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "tracer": { "max_depth": 8, "split_method": "sah" },
//!   "render": { "samples_per_pixel": 64 } }
//! ```

use crate::bvh::SplitMethod;
use crate::scene::Acceleration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings of the radiance estimator and its acceleration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Deepest bounce that still contributes radiance
    pub max_depth: u32,
    /// Probability of continuing a path at each vertex
    pub russian_roulette: f32,
    /// Build a BVH; when false every ray tests every primitive
    pub accelerate: bool,
    /// Maximum primitives per BVH leaf
    pub max_prims_in_node: usize,
    pub split_method: SplitMethod,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            russian_roulette: 0.8,
            accelerate: true,
            max_prims_in_node: 1,
            split_method: SplitMethod::Naive,
        }
    }
}

impl TracerConfig {
    pub fn acceleration(&self) -> Acceleration {
        if self.accelerate {
            Acceleration::Bvh {
                max_prims_in_node: self.max_prims_in_node,
                split: self.split_method,
            }
        } else {
            Acceleration::Linear
        }
    }
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Camera rays averaged per pixel
    pub samples_per_pixel: u32,
    /// Edge length of the square render buckets
    pub bucket_size: u32,
    /// Base seed; each bucket derives its own generator from it
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            samples_per_pixel: 16,
            bucket_size: 64,
            seed: 0,
        }
    }
}

/// Top-level config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuxConfig {
    pub tracer: TracerConfig,
    pub render: RenderConfig,
}

impl LuxConfig {
    /// Parse a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
