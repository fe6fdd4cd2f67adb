pub mod preprocessing;
pub mod cleanup;
pub mod watershed;
pub mod regions;
pub mod steps;

use std::sync::Arc;

use crate::error::Result;
use crate::models::{IntensityImage, LabelImage, SegmentationParams};
use crate::pipeline::Pipeline;
use steps::*;

/// Build the nuclei segmentation pipeline:
/// blur, Otsu threshold, debris removal, closing, hole filling,
/// distance transform, seed detection and watershed.
pub fn build_standard_pipeline(params: &SegmentationParams) -> Result<Pipeline> {
    params.validate()?;

    Ok(Pipeline::new()
        .add_step(Arc::new(BlurStep { sigma: params.sigma }))
        .add_step(Arc::new(OtsuThresholdStep))
        .add_step(Arc::new(RemoveSmallObjectsStep {
            max_size: params.max_size,
        }))
        .add_step(Arc::new(ClosingStep {
            radius: params.closing_radius,
        }))
        .add_step(Arc::new(FillHolesStep))
        .add_step(Arc::new(DistanceTransformStep))
        .add_step(Arc::new(SeedDetectionStep))
        .add_step(Arc::new(WatershedStep)))
}

/// Segment one image into a label mask (0 = background, one positive label per nucleus)
pub fn segment(image: &IntensityImage, params: &SegmentationParams) -> Result<LabelImage> {
    let pipeline = build_standard_pipeline(params)?;
    pipeline.run("image", image.clone())?.into_labels()
}
