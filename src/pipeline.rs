use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, SegmentationError};
use crate::models::{BinaryMask, DistanceMap, IntensityImage, LabelImage};

/// Which artefact the most recent step produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Smoothed,
    Binary,
    Distance,
    Seeds,
    Labels,
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Float(f64),
    Int(i64),
}

/// Data that flows through the pipeline.
///
/// One PipelineData holds a single image and every artefact derived from it.
/// Nothing in it outlives the processing of that image.
#[derive(Clone)]
pub struct PipelineData {
    /// The raw input (shared efficiently via Arc)
    pub original: Arc<IntensityImage>,

    /// Working intensity image (smoothed once the blur step ran)
    pub intensity: IntensityImage,

    pub mask: Option<BinaryMask>,
    pub distance: Option<DistanceMap>,
    pub seeds: Option<LabelImage>,
    pub labels: Option<LabelImage>,

    pub stage: Stage,

    /// Per-step measurements (e.g. "threshold", "seed_count")
    pub metadata: HashMap<String, MetadataValue>,
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: IntensityImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            intensity: image,
            original,
            mask: None,
            distance: None,
            seeds: None,
            labels: None,
            stage: Stage::Input,
            metadata: HashMap::new(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.original.dimensions()
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.metadata.insert(key.into(), value);
    }

    /// Get metadata as bool
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key) {
            Some(MetadataValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get metadata as float
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get metadata as int
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    fn check_shape(&self, artefact: &'static str, actual: (u32, u32)) -> Result<()> {
        let expected = self.dimensions();
        if expected != actual {
            return Err(SegmentationError::ShapeMismatch {
                artefact,
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn require_mask(&self, step: &'static str) -> Result<&BinaryMask> {
        let mask = self.mask.as_ref().ok_or(SegmentationError::MissingStage {
            step,
            artefact: "binary mask",
        })?;
        self.check_shape("binary mask", mask.dimensions())?;
        Ok(mask)
    }

    pub fn require_distance(&self, step: &'static str) -> Result<&DistanceMap> {
        let distance = self.distance.as_ref().ok_or(SegmentationError::MissingStage {
            step,
            artefact: "distance map",
        })?;
        self.check_shape("distance map", distance.dimensions())?;
        Ok(distance)
    }

    pub fn require_seeds(&self, step: &'static str) -> Result<&LabelImage> {
        let seeds = self.seeds.as_ref().ok_or(SegmentationError::MissingStage {
            step,
            artefact: "seed markers",
        })?;
        self.check_shape("seed markers", seeds.dimensions())?;
        Ok(seeds)
    }

    /// Take the final label mask, dropping every intermediate artefact
    pub fn into_labels(self) -> Result<LabelImage> {
        let expected = self.dimensions();
        let labels = self.labels.ok_or(SegmentationError::MissingStage {
            step: "output",
            artefact: "label mask",
        })?;
        if labels.dimensions() != expected {
            return Err(SegmentationError::ShapeMismatch {
                artefact: "label mask",
                expected,
                actual: labels.dimensions(),
            });
        }
        Ok(labels)
    }

    /// Render the current stage as a viewable image
    pub fn snapshot(&self) -> DynamicImage {
        match self.stage {
            Stage::Input | Stage::Smoothed => DynamicImage::ImageLuma16(self.intensity.clone()),
            Stage::Binary => match &self.mask {
                Some(mask) => DynamicImage::ImageLuma8(mask.clone()),
                None => DynamicImage::ImageLuma16(self.intensity.clone()),
            },
            Stage::Distance => match &self.distance {
                Some(distance) => DynamicImage::ImageLuma8(render_distance(distance)),
                None => DynamicImage::ImageLuma16(self.intensity.clone()),
            },
            Stage::Seeds => match &self.seeds {
                Some(seeds) => DynamicImage::ImageRgb8(render_labels(seeds)),
                None => DynamicImage::ImageLuma16(self.intensity.clone()),
            },
            Stage::Labels => match &self.labels {
                Some(labels) => DynamicImage::ImageRgb8(render_labels(labels)),
                None => DynamicImage::ImageLuma16(self.intensity.clone()),
            },
        }
    }
}

fn render_distance(distance: &DistanceMap) -> GrayImage {
    let max = distance.pixels().map(|p| p[0]).fold(0.0, f64::max);
    let scale = if max > 0.0 { 255.0 / max } else { 0.0 };
    let (width, height) = distance.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        Luma([(distance.get_pixel(x, y)[0] * scale).round().min(255.0) as u8])
    })
}

/// Pseudo-colour labels so neighbouring nuclei are distinguishable
fn render_labels(labels: &LabelImage) -> RgbImage {
    let (width, height) = labels.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let label = labels.get_pixel(x, y)[0];
        if label == 0 {
            return Rgb([0, 0, 0]);
        }
        let hash = label.wrapping_mul(2_654_435_761);
        Rgb([
            64 + (hash & 0xBF) as u8,
            64 + ((hash >> 8) & 0xBF) as u8,
            64 + ((hash >> 16) & 0xBF) as u8,
        ])
    })
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

impl DebugConfig {
    fn save(&self, dir_name: &str, image_name: &str, image: &DynamicImage) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let step_dir = self.output_dir.join(dir_name);
        std::fs::create_dir_all(&step_dir)?;
        let output_path = step_dir.join(format!("{}.png", image_name));
        image.save(&output_path)?;
        debug!("Debug: saved {}/{}.png", dir_name, image_name);
        Ok(())
    }
}

/// Context available to all pipeline steps
#[derive(Clone)]
pub struct PipelineContext {
    /// Name of the image being processed (used for debug output)
    pub image_name: String,
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Transform the data, usually by adding the artefact this step produces
    fn process(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData>;

    /// Human-readable name for this step (used in logs and debug directories)
    fn name(&self) -> &str;
}

fn step_dir_name(index: usize, name: &str) -> String {
    format!("{:02}_{}", index, name.to_lowercase().replace(' ', "_"))
}

/// Composable pipeline builder
#[derive(Clone)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            debug: None,
        }
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(SegmentationError::DebugDirNotEmpty(output_dir));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step on one image
    pub fn run(&self, image_name: &str, input: IntensityImage) -> Result<PipelineData> {
        self.run_partial(image_name, input, self.steps.len())
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(
        &self,
        image_name: &str,
        input: IntensityImage,
        num_steps: usize,
    ) -> Result<PipelineData> {
        let (width, height) = input.dimensions();
        if width == 0 || height == 0 {
            return Err(SegmentationError::InvalidInput(format!(
                "image '{}' is empty ({}x{})",
                image_name, width, height
            )));
        }

        let context = PipelineContext {
            image_name: image_name.to_string(),
            debug: self.debug.clone(),
        };

        let mut data = PipelineData::from_image(input);

        if let Some(debug_config) = &context.debug {
            debug_config.save("00_input", image_name, &data.snapshot())?;
        }

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!("{}: running step {} ({})", image_name, step_idx + 1, step.name());
            data = step.process(data, &context)?;

            if let Some(debug_config) = &context.debug {
                let dir_name = step_dir_name(step_idx + 1, step.name());
                debug_config.save(&dir_name, image_name, &data.snapshot())?;
            }
        }

        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
