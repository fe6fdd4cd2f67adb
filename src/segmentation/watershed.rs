//! Distance-transform watershed for splitting touching nuclei.
//!
//! The distance map peaks at the centre of each compact blob. Regional maxima of
//! that map become seeds, and a priority flood of the inverted distance map
//! grows every seed into its catchment basin inside the foreground mask.

use image::Luma;
use imageproc::distance_transform::euclidean_squared_distance_transform;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use crate::models::{BinaryMask, DistanceMap, LabelImage, BACKGROUND, FOREGROUND};

/// 8-connected neighbourhood used for plateaus and peak comparison
const NEIGHBORS_8: [(i64, i64); 8] = [
    (-1, -1), (0, -1), (1, -1),
    (-1, 0),           (1, 0),
    (-1, 1),  (0, 1),  (1, 1),
];

/// 4-connected neighbourhood used for flooding
const NEIGHBORS_4: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// Euclidean distance from every foreground pixel to the nearest background pixel.
///
/// A mask without any background pixel is treated as a flat plateau of height 1.
pub fn distance_transform(mask: &BinaryMask) -> DistanceMap {
    let (width, height) = mask.dimensions();

    if !mask.pixels().any(|p| p[0] == BACKGROUND) {
        return DistanceMap::from_pixel(width, height, Luma([1.0]));
    }

    // imageproc measures distance to the nearest non-zero pixel, so feed it the background
    let mut background = mask.clone();
    for p in background.pixels_mut() {
        p[0] = if p[0] == BACKGROUND { FOREGROUND } else { BACKGROUND };
    }
    let squared = euclidean_squared_distance_transform(&background);

    DistanceMap::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] == BACKGROUND {
            Luma([0.0])
        } else {
            Luma([squared.get_pixel(x, y)[0].sqrt()])
        }
    })
}

fn neighbor(x: u32, y: u32, (dx, dy): (i64, i64), width: u32, height: u32) -> Option<(u32, u32)> {
    let nx = x as i64 + dx;
    let ny = y as i64 + dy;
    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
        None
    } else {
        Some((nx as u32, ny as u32))
    }
}

/// Label the regional maxima of the distance map.
///
/// A plateau is an 8-connected set of foreground pixels sharing one positive
/// distance value. It is a maximum when no pixel bordering it is higher, and
/// every such plateau becomes one seed. Saddle points on the ridge between
/// two touching blobs sit on a plateau with a higher neighbour, so they do
/// not seed a basin of their own.
///
/// Plateaus and their borders never cross between 4-connected mask
/// components. Objects touching only at a corner are flooded separately,
/// so each needs its own seed.
/// Returns the seed raster and the number of seeds.
pub fn find_seeds(distance: &DistanceMap, mask: &BinaryMask) -> (LabelImage, u32) {
    let (width, height) = distance.dimensions();
    let mut seeds = LabelImage::new(width, height);
    let mut visited = vec![false; (width as usize) * (height as usize)];
    let index = |x: u32, y: u32| (y as usize) * (width as usize) + x as usize;
    let components = connected_components(mask, Connectivity::Four, Luma([BACKGROUND]));
    let mut count = 0u32;

    for (x, y, value) in distance.enumerate_pixels() {
        let value = value[0];
        if visited[index(x, y)] || mask.get_pixel(x, y)[0] == BACKGROUND || value <= 0.0 {
            continue;
        }

        visited[index(x, y)] = true;
        let component = components.get_pixel(x, y)[0];
        let mut plateau = vec![(x, y)];
        let mut queue = VecDeque::from([(x, y)]);
        let mut is_maximum = true;

        while let Some((px, py)) = queue.pop_front() {
            for &offset in &NEIGHBORS_8 {
                let Some((nx, ny)) = neighbor(px, py, offset, width, height) else {
                    continue;
                };
                if components.get_pixel(nx, ny)[0] != component {
                    continue;
                }
                let other = distance.get_pixel(nx, ny)[0];
                if other > value {
                    is_maximum = false;
                } else if other == value && !visited[index(nx, ny)] {
                    visited[index(nx, ny)] = true;
                    plateau.push((nx, ny));
                    queue.push_back((nx, ny));
                }
            }
        }

        if is_maximum {
            count += 1;
            for (px, py) in plateau {
                seeds.put_pixel(px, py, Luma([count]));
            }
        }
    }

    (seeds, count)
}

/// A pixel waiting in the flood queue
#[derive(Debug, Clone, Copy)]
struct FloodCell {
    elevation: f64,
    age: u64,
    x: u32,
    y: u32,
}

impl PartialEq for FloodCell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodCell {}

impl PartialOrd for FloodCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so BinaryHeap pops the lowest elevation first, then the oldest entry
impl Ord for FloodCell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| other.age.cmp(&self.age))
    }
}

/// Marker-controlled watershed on the inverted distance map.
///
/// Seeds flood outward over 4-connected foreground pixels in order of
/// increasing `-distance`. Equal elevations are served first-in first-out,
/// so a pixel reachable from two basins at the same height joins the basin
/// that queued it first. Foreground pixels no seed can reach stay 0.
pub fn watershed(distance: &DistanceMap, seeds: &LabelImage, mask: &BinaryMask) -> LabelImage {
    let (width, height) = distance.dimensions();
    let mut labels = LabelImage::new(width, height);
    let mut heap = BinaryHeap::new();
    let mut age = 0u64;

    for (x, y, seed) in seeds.enumerate_pixels() {
        if seed[0] == 0 || mask.get_pixel(x, y)[0] == BACKGROUND {
            continue;
        }
        labels.put_pixel(x, y, *seed);
        heap.push(FloodCell {
            elevation: -distance.get_pixel(x, y)[0],
            age,
            x,
            y,
        });
        age += 1;
    }

    while let Some(cell) = heap.pop() {
        let label = labels.get_pixel(cell.x, cell.y)[0];
        for &offset in &NEIGHBORS_4 {
            let Some((nx, ny)) = neighbor(cell.x, cell.y, offset, width, height) else {
                continue;
            };
            if mask.get_pixel(nx, ny)[0] == BACKGROUND || labels.get_pixel(nx, ny)[0] != 0 {
                continue;
            }
            labels.put_pixel(nx, ny, Luma([label]));
            heap.push(FloodCell {
                elevation: -distance.get_pixel(nx, ny)[0],
                age,
                x: nx,
                y: ny,
            });
            age += 1;
        }
    }

    labels
}

/// Number of distinct positive labels in a label raster
pub fn count_labels(labels: &LabelImage) -> usize {
    let mut seen: Vec<u32> = labels.pixels().map(|p| p[0]).filter(|&l| l != 0).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}
