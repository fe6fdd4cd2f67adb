use tracing::{debug, warn};

use crate::error::{Result, SegmentationError};
use crate::pipeline::{MetadataValue, PipelineContext, PipelineData, PipelineStep, Stage};
use crate::segmentation::{cleanup, preprocessing, watershed};

/// Apply Gaussian blur
pub struct BlurStep {
    pub sigma: f32,
}

impl PipelineStep for BlurStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(SegmentationError::InvalidParameter {
                name: "sigma",
                value: self.sigma.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }
        data.intensity = preprocessing::apply_blur(&data.intensity, self.sigma);
        data.stage = Stage::Smoothed;
        Ok(data)
    }

    fn name(&self) -> &str {
        "Gaussian Blur"
    }
}

/// Global Otsu threshold; a constant image gives an empty mask
pub struct OtsuThresholdStep;

impl PipelineStep for OtsuThresholdStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData> {
        let level = preprocessing::otsu_threshold(&data.intensity);
        if level.degenerate {
            warn!(
                "{}: intensity histogram has a single value ({}), no foreground",
                context.image_name, level.threshold
            );
        } else {
            debug!("{}: Otsu threshold {:.2}", context.image_name, level.threshold);
        }

        data.mask = Some(preprocessing::binarize(&data.intensity, level.threshold));
        data.stage = Stage::Binary;
        data.set_metadata("threshold", MetadataValue::Float(level.threshold));
        data.set_metadata("degenerate_threshold", MetadataValue::Bool(level.degenerate));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Otsu Threshold"
    }
}

/// Remove debris: components with area <= max_size
pub struct RemoveSmallObjectsStep {
    pub max_size: u32,
}

impl PipelineStep for RemoveSmallObjectsStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData> {
        let mask = data.require_mask("Remove Small Objects")?;
        let (cleaned, removed) = cleanup::remove_small_objects(mask, self.max_size);
        debug!(
            "{}: removed {} objects of area <= {}",
            context.image_name, removed, self.max_size
        );

        data.mask = Some(cleaned);
        data.stage = Stage::Binary;
        data.set_metadata("removed_objects", MetadataValue::Int(removed as i64));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Remove Small Objects"
    }
}

/// Binary closing with a disk structuring element
pub struct ClosingStep {
    pub radius: u32,
}

impl PipelineStep for ClosingStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let radius = u8::try_from(self.radius).map_err(|_| SegmentationError::InvalidParameter {
            name: "closing_radius",
            value: self.radius.to_string(),
            reason: format!("must not exceed {}", u8::MAX),
        })?;
        let mask = data.require_mask("Morphological Closing")?;
        data.mask = Some(cleanup::close_mask(mask, radius));
        data.stage = Stage::Binary;
        Ok(data)
    }

    fn name(&self) -> &str {
        "Morphological Closing"
    }
}

/// Fill holes enclosed by foreground
pub struct FillHolesStep;

impl PipelineStep for FillHolesStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData> {
        let mask = data.require_mask("Fill Holes")?;
        let (filled, holes) = cleanup::fill_holes(mask);
        if holes > 0 {
            debug!("{}: filled {} holes", context.image_name, holes);
        }

        data.mask = Some(filled);
        data.stage = Stage::Binary;
        data.set_metadata("filled_holes", MetadataValue::Int(holes as i64));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Fill Holes"
    }
}

/// Euclidean distance to background
pub struct DistanceTransformStep;

impl PipelineStep for DistanceTransformStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let mask = data.require_mask("Distance Transform")?;
        data.distance = Some(watershed::distance_transform(mask));
        data.stage = Stage::Distance;
        Ok(data)
    }

    fn name(&self) -> &str {
        "Distance Transform"
    }
}

/// Local maxima of the distance map become watershed seeds
pub struct SeedDetectionStep;

impl PipelineStep for SeedDetectionStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData> {
        let mask = data.require_mask("Seed Detection")?;
        let distance = data.require_distance("Seed Detection")?;
        let (seeds, count) = watershed::find_seeds(distance, mask);
        debug!("{}: {} seeds", context.image_name, count);

        data.seeds = Some(seeds);
        data.stage = Stage::Seeds;
        data.set_metadata("seed_count", MetadataValue::Int(count as i64));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Seed Detection"
    }
}

/// Flood the inverted distance map from the seeds inside the mask
pub struct WatershedStep;

impl PipelineStep for WatershedStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData> {
        let mask = data.require_mask("Watershed")?;
        let distance = data.require_distance("Watershed")?;
        let seeds = data.require_seeds("Watershed")?;

        let no_seeds = seeds.pixels().all(|p| p[0] == 0);
        if no_seeds && cleanup::foreground_area(mask) > 0 {
            warn!(
                "{}: no seeds found in a non-empty mask, leaving it unlabeled",
                context.image_name
            );
        }

        let labels = watershed::watershed(distance, seeds, mask);
        let count = watershed::count_labels(&labels);

        data.labels = Some(labels);
        data.stage = Stage::Labels;
        data.set_metadata("no_seeds", MetadataValue::Bool(no_seeds));
        data.set_metadata("label_count", MetadataValue::Int(count as i64));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Watershed"
    }
}
