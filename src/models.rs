use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentationError};

/// Single-channel input raster, widened to 16 bits on load
pub type IntensityImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Binary mask: 0 = background, 255 = foreground
pub type BinaryMask = GrayImage;

/// Euclidean distance to the nearest background pixel
pub type DistanceMap = ImageBuffer<Luma<f64>, Vec<f64>>;

/// Label raster: 0 = background, every positive value is one object
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Label raster as written to disk
pub type LabelImage16 = ImageBuffer<Luma<u16>, Vec<u16>>;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Tunable parameters, constant across all images of a batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    /// Standard deviation of the Gaussian blur
    pub sigma: f32,
    /// Connected components with area <= max_size are dropped as debris
    pub max_size: u32,
    /// Radius of the disk used for binary closing (0 disables closing)
    pub closing_radius: u32,
}

impl SegmentationParams {
    pub fn new(sigma: f32, max_size: u32, closing_radius: u32) -> Self {
        Self {
            sigma,
            max_size,
            closing_radius,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(SegmentationError::InvalidParameter {
                name: "sigma",
                value: self.sigma.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }
        if self.closing_radius > u8::MAX as u32 {
            return Err(SegmentationError::InvalidParameter {
                name: "closing_radius",
                value: self.closing_radius.to_string(),
                reason: format!("must not exceed {}", u8::MAX),
            });
        }
        Ok(())
    }
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            sigma: 2.0,
            max_size: 200,
            closing_radius: 3,
        }
    }
}

/// Measurements of one labeled nucleus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionProps {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub area: u32,
    pub centroid: (f64, f64),
    pub mean_intensity: f64,
}

impl RegionProps {
    /// Diameter of the disk with the same area
    pub fn equivalent_diameter(&self) -> f64 {
        (4.0 * self.area as f64 / std::f64::consts::PI).sqrt()
    }
}
