mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from nucleiseg for tests
pub use nucleiseg::models::{BinaryMask, IntensityImage, LabelImage, FOREGROUND, BACKGROUND};
