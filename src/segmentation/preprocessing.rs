use image::{DynamicImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use crate::models::{BinaryMask, IntensityImage, BACKGROUND, FOREGROUND};

const OTSU_BINS: usize = 256;

/// Convert any decoded image to a single 16-bit intensity channel
pub fn to_intensity(img: &DynamicImage) -> IntensityImage {
    img.to_luma16()
}

/// Apply Gaussian blur to suppress pixel noise
pub fn apply_blur(img: &IntensityImage, sigma: f32) -> IntensityImage {
    gaussian_blur_f32(img, sigma)
}

/// Result of Otsu threshold selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtsuLevel {
    pub threshold: f64,
    /// The histogram held a single intensity, so no split exists
    pub degenerate: bool,
}

/// Compute a global threshold with Otsu's method.
///
/// The histogram spans the actual [min, max] range of the image in 256 equal
/// bins. The returned level is the centre of the bin that maximises the
/// between-class variance; the first maximum wins on ties. A constant image
/// yields its own value as the threshold and is flagged as degenerate.
pub fn otsu_threshold(img: &IntensityImage) -> OtsuLevel {
    let (min, max) = img
        .pixels()
        .fold((u16::MAX, u16::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if img.width() == 0 || img.height() == 0 {
        return OtsuLevel {
            threshold: 0.0,
            degenerate: true,
        };
    }
    if min == max {
        return OtsuLevel {
            threshold: min as f64,
            degenerate: true,
        };
    }

    let lo = min as f64;
    let bin_width = (max as f64 - lo) / OTSU_BINS as f64;

    let mut histogram = [0u64; OTSU_BINS];
    for p in img.pixels() {
        let bin = ((p[0] as f64 - lo) / bin_width) as usize;
        histogram[bin.min(OTSU_BINS - 1)] += 1;
    }
    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| lo + (i as f64 + 0.5) * bin_width)
        .collect();

    let total: f64 = histogram.iter().map(|&c| c as f64).sum();
    let total_sum: f64 = histogram
        .iter()
        .zip(&centers)
        .map(|(&c, &v)| c as f64 * v)
        .sum();

    let mut weight_b = 0.0;
    let mut sum_b = 0.0;
    let mut best_variance = f64::NEG_INFINITY;
    let mut best_bin = 0;

    // Split after bin i: [0..=i] background, [i+1..] foreground
    for i in 0..OTSU_BINS - 1 {
        weight_b += histogram[i] as f64;
        sum_b += histogram[i] as f64 * centers[i];
        let weight_f = total - weight_b;
        if weight_b == 0.0 || weight_f == 0.0 {
            continue;
        }

        let mean_b = sum_b / weight_b;
        let mean_f = (total_sum - sum_b) / weight_f;
        let variance = weight_b * weight_f * (mean_b - mean_f).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_bin = i;
        }
    }

    OtsuLevel {
        threshold: centers[best_bin],
        degenerate: false,
    }
}

/// Pixels strictly above the threshold become foreground
pub fn binarize(img: &IntensityImage, threshold: f64) -> BinaryMask {
    let (width, height) = img.dimensions();
    BinaryMask::from_fn(width, height, |x, y| {
        if img.get_pixel(x, y)[0] as f64 > threshold {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}
