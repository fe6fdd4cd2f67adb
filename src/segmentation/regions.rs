use image::Luma;
use std::collections::BTreeMap;

use crate::error::{Result, SegmentationError};
use crate::models::{IntensityImage, LabelImage, LabelImage16, RegionProps};

#[derive(Default)]
struct Accumulator {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    count: u32,
    sum_x: u64,
    sum_y: u64,
    sum_intensity: u64,
}

/// Measure every labeled region against the raw intensity image.
///
/// Regions come back sorted by label.
pub fn region_props(labels: &LabelImage, intensity: &IntensityImage) -> Result<Vec<RegionProps>> {
    if labels.dimensions() != intensity.dimensions() {
        return Err(SegmentationError::ShapeMismatch {
            artefact: "label mask",
            expected: intensity.dimensions(),
            actual: labels.dimensions(),
        });
    }

    let mut regions: BTreeMap<u32, Accumulator> = BTreeMap::new();

    for (x, y, label) in labels.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue;
        }
        let value = intensity.get_pixel(x, y)[0] as u64;

        let acc = regions.entry(label_val).or_insert_with(|| Accumulator {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            ..Default::default()
        });
        acc.min_x = acc.min_x.min(x);
        acc.min_y = acc.min_y.min(y);
        acc.max_x = acc.max_x.max(x);
        acc.max_y = acc.max_y.max(y);
        acc.count += 1;
        acc.sum_x += x as u64;
        acc.sum_y += y as u64;
        acc.sum_intensity += value;
    }

    Ok(regions
        .into_iter()
        .map(|(label, acc)| {
            let n = acc.count as f64;
            RegionProps {
                label,
                min_x: acc.min_x,
                min_y: acc.min_y,
                max_x: acc.max_x,
                max_y: acc.max_y,
                area: acc.count,
                centroid: (acc.sum_x as f64 / n, acc.sum_y as f64 / n),
                mean_intensity: acc.sum_intensity as f64 / n,
            }
        })
        .collect())
}

/// Narrow a label raster to 16 bits for writing to disk
pub fn to_label_image16(labels: &LabelImage) -> Result<LabelImage16> {
    let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0);
    if max_label > u16::MAX as u32 {
        return Err(SegmentationError::LabelOverflow(max_label));
    }
    let (width, height) = labels.dimensions();
    Ok(LabelImage16::from_fn(width, height, |x, y| {
        Luma([labels.get_pixel(x, y)[0] as u16])
    }))
}
