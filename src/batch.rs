//! Directory-level batch driver.
//!
//! Every regular file in the input directory is decoded, segmented and
//! written as a 16-bit label mask into the output directory. A file that
//! fails at any point is logged and skipped; the rest of the batch goes on.

use anyhow::{Context, Result};
use image::ImageReader;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{RegionProps, SegmentationParams};
use crate::pipeline::Pipeline;
use crate::segmentation::{build_standard_pipeline, preprocessing, regions};

/// Extensions written as-is; any other input is written as PNG
const LABEL_EXTENSIONS: [&str; 3] = ["png", "tif", "tiff"];

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Segment images concurrently
    pub parallel: bool,
    /// Save per-step snapshots into this (empty or missing) directory
    pub debug_out: Option<PathBuf>,
}

/// Outcome of one successfully processed image
#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub filename: String,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub threshold: Option<f64>,
    pub nuclei: usize,
    /// Mean equivalent diameter of the detected nuclei, in pixels
    pub mean_diameter: Option<f64>,
    pub regions: Vec<RegionProps>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedImage {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub params: SegmentationParams,
    pub processed: Vec<ImageReport>,
    pub skipped: Vec<SkippedImage>,
}

impl BatchReport {
    pub fn total_nuclei(&self) -> usize {
        self.processed.iter().map(|r| r.nuclei).sum()
    }
}

/// Output file name for a given input file name
pub fn output_name(filename: &str) -> String {
    let path = Path::new(filename);
    let keep = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| LABEL_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if keep {
        filename.to_string()
    } else {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        format!("{}.png", stem)
    }
}

/// Regular files of a directory, sorted by name
pub fn list_images(in_path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(in_path)
        .with_context(|| format!("Failed to read input directory {}", in_path.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Segment one image file and save its label mask
pub fn process_single_image(
    pipeline: &Pipeline,
    input_path: &Path,
    output_path: &Path,
) -> Result<ImageReport> {
    let filename = file_name(input_path);

    let img = ImageReader::open(input_path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    let intensity = preprocessing::to_intensity(&img);
    let (width, height) = intensity.dimensions();

    // Keyed by the full file name so cells.png and cells.jpg keep separate debug snapshots
    let data = pipeline.run(&filename, intensity)?;
    let threshold = data.get_float("threshold");
    let original = data.original.clone();
    let labels = data.into_labels()?;

    let regions = regions::region_props(&labels, &original)?;
    info!("{}: nuclei detected: {}", filename, regions.len());
    let mean_diameter = (!regions.is_empty()).then(|| {
        regions.iter().map(|r| r.equivalent_diameter()).sum::<f64>() / regions.len() as f64
    });

    regions::to_label_image16(&labels)?
        .save(output_path)
        .with_context(|| format!("Failed to write label mask {}", output_path.display()))?;

    Ok(ImageReport {
        filename,
        output: output_path.to_path_buf(),
        width,
        height,
        threshold,
        nuclei: regions.len(),
        mean_diameter,
        regions,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Pair every input with its output path.
///
/// Two inputs that would write the same label file (compared
/// case-insensitively) cannot both be processed. An input already in a
/// label format claims its own name first, then the rest in name order;
/// every later claimant is skipped.
pub fn assign_outputs(
    files: &[PathBuf],
    out_path: &Path,
) -> (Vec<(PathBuf, PathBuf)>, Vec<SkippedImage>) {
    let names: Vec<(String, String)> = files
        .iter()
        .map(|f| {
            let filename = file_name(f);
            let output = output_name(&filename);
            (filename, output)
        })
        .collect();

    let (native, converted): (Vec<usize>, Vec<usize>) =
        (0..names.len()).partition(|&idx| names[idx].0 == names[idx].1);

    let mut owners: HashMap<String, usize> = HashMap::new();
    for idx in native.into_iter().chain(converted) {
        owners.entry(names[idx].1.to_lowercase()).or_insert(idx);
    }

    let mut assigned = Vec::new();
    let mut skipped = Vec::new();
    for (idx, (filename, output)) in names.iter().enumerate() {
        let owner = owners[&output.to_lowercase()];
        if owner == idx {
            assigned.push((files[idx].clone(), out_path.join(output)));
        } else {
            skipped.push(SkippedImage {
                filename: filename.clone(),
                reason: format!("output name {} collides with {}", output, names[owner].0),
            });
        }
    }
    (assigned, skipped)
}

/// Process all images in `in_path` and write label masks to `out_path`
pub fn run_analysis(
    in_path: &Path,
    out_path: &Path,
    params: &SegmentationParams,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let mut pipeline = build_standard_pipeline(params)?;
    if let Some(debug_dir) = &options.debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    std::fs::create_dir_all(out_path)
        .with_context(|| format!("Failed to create output directory {}", out_path.display()))?;

    let files = list_images(in_path)?;
    info!("Found {} files to process", files.len());

    let (assigned, mut skipped) = assign_outputs(&files, out_path);
    for item in &skipped {
        warn!("Skipping {}: {}", item.filename, item.reason);
    }

    let run_one = |(input_path, output_path): &(PathBuf, PathBuf)| {
        let filename = file_name(input_path);
        info!("Processing: {}", filename);
        let outcome = process_single_image(&pipeline, input_path, output_path);
        (filename, outcome)
    };

    let outcomes: Vec<(String, Result<ImageReport>)> = if options.parallel {
        assigned.par_iter().map(run_one).collect()
    } else {
        assigned.iter().map(run_one).collect()
    };

    let mut processed = Vec::new();
    for (filename, outcome) in outcomes {
        match outcome {
            Ok(report) => processed.push(report),
            Err(e) => {
                warn!("Skipping {}: {:#}", filename, e);
                skipped.push(SkippedImage {
                    filename,
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    skipped.sort_by(|a, b| a.filename.cmp(&b.filename));
    info!("Successfully processed {} images", processed.len());

    Ok(BatchReport {
        params: *params,
        processed,
        skipped,
    })
}
