use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::{HashMap, HashSet};

use crate::models::{BinaryMask, BACKGROUND, FOREGROUND};

/// Drop 4-connected foreground components whose area is <= `max_size`.
///
/// Returns the cleaned mask and the number of components removed.
pub fn remove_small_objects(mask: &BinaryMask, max_size: u32) -> (BinaryMask, usize) {
    let labeled = connected_components(mask, Connectivity::Four, Luma([BACKGROUND]));

    let mut areas: HashMap<u32, u32> = HashMap::new();
    for label in labeled.pixels() {
        if label[0] != 0 {
            *areas.entry(label[0]).or_insert(0) += 1;
        }
    }

    let removed = areas.values().filter(|&&area| area <= max_size).count();
    if removed == 0 {
        return (mask.clone(), 0);
    }

    let (width, height) = mask.dimensions();
    let cleaned = BinaryMask::from_fn(width, height, |x, y| {
        let label = labeled.get_pixel(x, y)[0];
        if label != 0 && areas[&label] > max_size {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });

    (cleaned, removed)
}

/// Binary closing with a Euclidean disk of the given radius
pub fn close_mask(mask: &BinaryMask, radius: u8) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    close(mask, Norm::L2, radius)
}

/// Fill background regions that do not touch the image border.
///
/// Returns the filled mask and the number of holes filled.
pub fn fill_holes(mask: &BinaryMask) -> (BinaryMask, usize) {
    let (width, height) = mask.dimensions();

    let mut inverted = mask.clone();
    for p in inverted.pixels_mut() {
        p[0] = if p[0] == BACKGROUND { FOREGROUND } else { BACKGROUND };
    }
    let regions = connected_components(&inverted, Connectivity::Four, Luma([BACKGROUND]));

    let mut touching_border = HashSet::new();
    let mut all_regions = HashSet::new();
    for (x, y, label) in regions.enumerate_pixels() {
        if label[0] == 0 {
            continue;
        }
        all_regions.insert(label[0]);
        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            touching_border.insert(label[0]);
        }
    }

    let holes = all_regions.len() - touching_border.len();
    if holes == 0 {
        return (mask.clone(), 0);
    }

    let filled = BinaryMask::from_fn(width, height, |x, y| {
        let label = regions.get_pixel(x, y)[0];
        if label == 0 || !touching_border.contains(&label) {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });

    (filled, holes)
}

pub fn foreground_area(mask: &BinaryMask) -> usize {
    mask.pixels().filter(|p| p[0] != BACKGROUND).count()
}
