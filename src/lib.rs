pub mod batch;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod segmentation;

pub use error::{Result, SegmentationError};
pub use models::{IntensityImage, LabelImage, RegionProps, SegmentationParams};
pub use pipeline::{
    DebugConfig, MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep, Stage,
};
pub use segmentation::{build_standard_pipeline, segment};
pub use batch::{run_analysis, BatchOptions, BatchReport, ImageReport, SkippedImage};
