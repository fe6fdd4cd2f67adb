mod common;

use common::*;
use image::{DynamicImage, GrayImage, Luma};
use nucleiseg::segmentation::preprocessing::{apply_blur, binarize, otsu_threshold, to_intensity};

#[test]
fn test_otsu_splits_two_populations() {
    let img = IntensityImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 100 } else { 900 }]));

    let level = otsu_threshold(&img);
    assert!(!level.degenerate);
    assert!(level.threshold > 100.0 && level.threshold < 900.0);

    let mask = binarize(&img, level.threshold);
    assert_eq!(foreground_count(&mask), 100);
    assert_eq!(mask.get_pixel(15, 5)[0], FOREGROUND);
    assert_eq!(mask.get_pixel(2, 5)[0], BACKGROUND);
}

#[test]
fn test_otsu_on_constant_image_is_degenerate() {
    let img = IntensityImage::from_pixel(8, 8, Luma([42]));

    let level = otsu_threshold(&img);
    assert!(level.degenerate);
    assert_eq!(level.threshold, 42.0);

    // Strictly-greater comparison leaves a constant image empty
    let mask = binarize(&img, level.threshold);
    assert_eq!(foreground_count(&mask), 0);
}

#[test]
fn test_otsu_on_blurred_blobs_keeps_blob_centres() {
    let img = disk_image(48, 48, &[(12, 12, 6), (34, 30, 8)]);
    let blurred = apply_blur(&img, 2.0);

    let level = otsu_threshold(&blurred);
    assert!(level.threshold > 0.0 && level.threshold < NUCLEUS_INTENSITY as f64);

    let mask = binarize(&blurred, level.threshold);
    assert_eq!(mask.get_pixel(12, 12)[0], FOREGROUND);
    assert_eq!(mask.get_pixel(34, 30)[0], FOREGROUND);
    assert_eq!(mask.get_pixel(0, 47)[0], BACKGROUND);
}

#[test]
fn test_binarize_is_strictly_greater() {
    let img = IntensityImage::from_fn(3, 1, |x, _| Luma([[10, 20, 30][x as usize]]));
    let mask = binarize(&img, 20.0);

    assert_eq!(mask.get_pixel(0, 0)[0], BACKGROUND);
    assert_eq!(mask.get_pixel(1, 0)[0], BACKGROUND);
    assert_eq!(mask.get_pixel(2, 0)[0], FOREGROUND);
}

#[test]
fn test_blur_spreads_a_single_bright_pixel() {
    let mut img = IntensityImage::new(15, 15);
    img.put_pixel(7, 7, Luma([10_000]));

    let blurred = apply_blur(&img, 1.5);
    assert_eq!(blurred.dimensions(), (15, 15));

    let centre = blurred.get_pixel(7, 7)[0];
    assert!(centre > 0 && centre < 10_000);
    assert!(blurred.get_pixel(8, 7)[0] > 0);
    assert!(blurred.get_pixel(8, 7)[0] <= centre);
}

#[test]
fn test_to_intensity_widens_8_bit_images() {
    let gray = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
    let intensity = to_intensity(&DynamicImage::ImageLuma8(gray));

    assert_eq!(intensity.dimensions(), (2, 1));
    assert_eq!(intensity.get_pixel(0, 0)[0], 0);
    assert_eq!(intensity.get_pixel(1, 0)[0], u16::MAX);
}
