mod common;

use common::*;
use nucleiseg::segmentation::steps::{BlurStep, OtsuThresholdStep, WatershedStep};
use nucleiseg::{build_standard_pipeline, Pipeline, SegmentationError, SegmentationParams, Stage};
use std::sync::Arc;
use tempfile::TempDir;

const STEP_DIRS: [&str; 9] = [
    "00_input",
    "01_gaussian_blur",
    "02_otsu_threshold",
    "03_remove_small_objects",
    "04_morphological_closing",
    "05_fill_holes",
    "06_distance_transform",
    "07_seed_detection",
    "08_watershed",
];

#[test]
fn test_standard_pipeline_step_order() -> anyhow::Result<()> {
    let pipeline = build_standard_pipeline(&SegmentationParams::default())?;

    assert_eq!(
        pipeline.step_names(),
        vec![
            "Gaussian Blur",
            "Otsu Threshold",
            "Remove Small Objects",
            "Morphological Closing",
            "Fill Holes",
            "Distance Transform",
            "Seed Detection",
            "Watershed",
        ]
    );
    Ok(())
}

#[test]
fn test_run_partial_stops_after_thresholding() -> anyhow::Result<()> {
    let img = disk_image(48, 48, &[(16, 16, 8), (34, 34, 6)]);
    let pipeline = build_standard_pipeline(&SegmentationParams::default())?;

    let data = pipeline.run_partial("partial", img, 2)?;

    assert_eq!(data.stage, Stage::Binary);
    assert!(data.mask.is_some());
    assert!(data.distance.is_none());
    assert!(data.labels.is_none());
    assert!(data.get_float("threshold").is_some());
    assert_eq!(data.get_bool("degenerate_threshold"), Some(false));

    // No label mask yet
    assert!(matches!(
        data.into_labels(),
        Err(SegmentationError::MissingStage { .. })
    ));
    Ok(())
}

#[test]
fn test_full_run_records_metadata() -> anyhow::Result<()> {
    let img = disk_image(64, 64, &[(24, 32, 10), (40, 32, 10)]);
    let pipeline = build_standard_pipeline(&SegmentationParams::default())?;

    let data = pipeline.run("pair", img)?;

    assert_eq!(data.stage, Stage::Labels);
    assert_eq!(data.get_int("seed_count"), Some(2));
    assert_eq!(data.get_int("label_count"), Some(2));
    assert_eq!(data.get_bool("no_seeds"), Some(false));
    assert_eq!(data.get_int("removed_objects"), Some(0));
    Ok(())
}

#[test]
fn test_zero_image_flags_degenerate_threshold() -> anyhow::Result<()> {
    let pipeline = build_standard_pipeline(&SegmentationParams::default())?;

    let data = pipeline.run("blank", IntensityImage::new(16, 16))?;

    assert_eq!(data.get_bool("degenerate_threshold"), Some(true));
    assert_eq!(data.get_int("seed_count"), Some(0));
    assert_eq!(data.get_int("label_count"), Some(0));
    Ok(())
}

#[test]
fn test_step_without_its_inputs_reports_missing_stage() {
    let pipeline = Pipeline::new().add_step(Arc::new(WatershedStep));

    let result = pipeline.run("orphan", disk_image(16, 16, &[(8, 8, 4)]));

    assert!(matches!(
        result,
        Err(SegmentationError::MissingStage {
            step: "Watershed",
            ..
        })
    ));
}

#[test]
fn test_custom_pipeline_from_boxed_steps() -> anyhow::Result<()> {
    let pipeline = Pipeline::new()
        .add_step_boxed(Box::new(BlurStep { sigma: 1.0 }))
        .add_step(Arc::new(OtsuThresholdStep));

    let data = pipeline.run("custom", disk_image(32, 32, &[(16, 16, 6)]))?;

    let mask = data.mask.as_ref().expect("threshold step produces a mask");
    assert_eq!(mask.get_pixel(16, 16)[0], FOREGROUND);
    assert_eq!(mask.get_pixel(0, 0)[0], BACKGROUND);
    Ok(())
}

#[test]
fn test_debug_mode_writes_every_step() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let debug_dir = temp.path().join("debug");
    let pipeline = build_standard_pipeline(&SegmentationParams::default())?.with_debug(&debug_dir)?;

    pipeline.run("cells", disk_image(48, 48, &[(20, 20, 9)]))?;

    for dir in STEP_DIRS {
        let path = debug_dir.join(dir).join("cells.png");
        assert!(path.exists(), "missing debug output {}", path.display());
    }

    let labels = image::open(debug_dir.join("08_watershed").join("cells.png"))?;
    assert_eq!((labels.width(), labels.height()), (48, 48));
    Ok(())
}

#[test]
fn test_debug_mode_refuses_non_empty_directory() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    std::fs::write(temp.path().join("leftover.txt"), "old run")?;

    let result = build_standard_pipeline(&SegmentationParams::default())?.with_debug(temp.path());

    assert!(matches!(result, Err(SegmentationError::DebugDirNotEmpty(_))));
    Ok(())
}
