use image::Luma;
use nucleiseg::models::{BinaryMask, IntensityImage, LabelImage, BACKGROUND, FOREGROUND};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Intensity of synthetic nuclei against a zero background
pub const NUCLEUS_INTENSITY: u16 = 1000;

/// Creates a width x height image with filled disks (cx, cy, radius) of uniform intensity
pub fn disk_image(width: u32, height: u32, disks: &[(i64, i64, i64)]) -> IntensityImage {
    IntensityImage::from_fn(width, height, |x, y| {
        let inside = disks.iter().any(|&(cx, cy, r)| {
            let dx = x as i64 - cx;
            let dy = y as i64 - cy;
            dx * dx + dy * dy <= r * r
        });
        Luma([if inside { NUCLEUS_INTENSITY } else { 0 }])
    })
}

/// Creates a binary mask with filled axis-aligned rectangles (x, y, width, height)
pub fn rect_mask(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> BinaryMask {
    BinaryMask::from_fn(width, height, |x, y| {
        let inside = rects
            .iter()
            .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh);
        Luma([if inside { FOREGROUND } else { BACKGROUND }])
    })
}

/// Distinct positive labels of a label raster
pub fn label_set(labels: &LabelImage) -> BTreeSet<u32> {
    labels.pixels().map(|p| p[0]).filter(|&l| l != 0).collect()
}

pub fn label_at(labels: &LabelImage, x: u32, y: u32) -> u32 {
    labels.get_pixel(x, y)[0]
}

pub fn foreground_count(mask: &BinaryMask) -> usize {
    mask.pixels().filter(|p| p[0] == FOREGROUND).count()
}

/// Saves a synthetic image as an 8-bit PNG inside `dir` and returns its path
pub fn save_png(dir: &Path, name: &str, img: &IntensityImage) -> PathBuf {
    let scaled = image::GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([(img.get_pixel(x, y)[0] as u32 * 255 / NUCLEUS_INTENSITY as u32).min(255) as u8])
    });
    let path = dir.join(name);
    scaled
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}
