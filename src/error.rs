//! Error types for the segmentation library

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Invalid input image: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Step '{step}' requires the {artefact}, which no earlier step produced")]
    MissingStage {
        step: &'static str,
        artefact: &'static str,
    },

    #[error("Size mismatch in {artefact}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        artefact: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Label {0} does not fit in a 16-bit label image")]
    LabelOverflow(u32),

    #[error("Debug directory is not empty: {}", .0.display())]
    DebugDirNotEmpty(std::path::PathBuf),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
