//! Image thresholding and connected component labelling
//!
//! This module provides the segmentation building blocks used for source
//! extraction: significance thresholding restricted to valid pixels, 8-connected
//! component labelling, and per-component region summaries.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Bounding box for a detected object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Top left x coordinate (column)
    pub x_min: usize,

    /// Top left y coordinate (row)
    pub y_min: usize,

    /// Width of the bounding box
    pub width: usize,

    /// Height of the bounding box
    pub height: usize,
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(x_min: usize, y_min: usize, width: usize, height: usize) -> Self {
        Self {
            x_min,
            y_min,
            width,
            height,
        }
    }

    /// Get the exclusive right edge
    pub fn x_max(&self) -> usize {
        self.x_min + self.width
    }

    /// Get the exclusive bottom edge
    pub fn y_max(&self) -> usize {
        self.y_min + self.height
    }

    /// Check whether a (row, col) pixel falls inside the box
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.y_min && row < self.y_max() && col >= self.x_min && col < self.x_max()
    }
}

/// A labelled connected component
#[derive(Debug, Clone)]
pub struct Region {
    /// Label value in the label image (1-based)
    pub label: u32,
    /// Tight bounding box of the component
    pub bbox: BoundingBox,
    /// Member pixels as (row, col), in raster order
    pub pixels: Vec<(usize, usize)>,
}

impl Region {
    /// Number of pixels in the component
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    /// Binary mask of this component with the full image shape
    pub fn mask(&self, shape: (usize, usize)) -> Array2<bool> {
        let mut mask = Array2::from_elem(shape, false);
        for &(r, c) in &self.pixels {
            mask[[r, c]] = true;
        }
        mask
    }

    /// Maximum of `values` over the component pixels
    pub fn max_value(&self, values: ArrayView2<f64>) -> f64 {
        self.pixels
            .iter()
            .map(|&(r, c)| values[[r, c]])
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Apply thresholding to an image and return a binary mask
///
/// A pixel is set when it is strictly above `threshold` and, if a validity
/// mask is given, flagged valid there.
pub fn apply_threshold(
    image: ArrayView2<f64>,
    threshold: f64,
    valid: Option<ArrayView2<bool>>,
) -> Array2<bool> {
    match valid {
        Some(valid) => {
            ndarray::Zip::from(image)
                .and(valid)
                .map_collect(|&v, &ok| ok && v > threshold)
        }
        None => image.mapv(|v| v > threshold),
    }
}

/// Pixels that carry data: non-zero and finite
pub fn valid_pixel_mask(image: ArrayView2<f64>) -> Array2<bool> {
    image.mapv(|v| v != 0.0 && v.is_finite())
}

/// Find connected components in a binary mask
///
/// This uses a simple 8-connectivity flood fill algorithm. Labels are assigned
/// in raster order of each component's first pixel, starting at 1.
pub fn connected_components(mask: ArrayView2<bool>) -> (Array2<u32>, u32) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::zeros((rows, cols));
    let mut label_counter = 0;

    // 8-connectivity neighboring offsets
    let neighbors = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];

    for i in 0..rows {
        for j in 0..cols {
            if mask[[i, j]] && labels[[i, j]] == 0 {
                label_counter += 1;
                let mut stack = vec![(i, j)];

                while let Some((y, x)) = stack.pop() {
                    if !mask[[y, x]] || labels[[y, x]] != 0 {
                        continue;
                    }

                    labels[[y, x]] = label_counter;

                    for &(dy, dx) in &neighbors {
                        let ny = y as isize + dy;
                        let nx = x as isize + dx;

                        if ny >= 0 && ny < rows as isize && nx >= 0 && nx < cols as isize {
                            let ny = ny as usize;
                            let nx = nx as usize;

                            if mask[[ny, nx]] && labels[[ny, nx]] == 0 {
                                stack.push((ny, nx));
                            }
                        }
                    }
                }
            }
        }
    }

    (labels, label_counter)
}

/// Collect the regions of a label image, ordered by label
pub fn label_regions(labels: ArrayView2<u32>, num_labels: u32) -> Vec<Region> {
    let mut pixels: Vec<Vec<(usize, usize)>> = vec![Vec::new(); num_labels as usize];

    for ((r, c), &label) in labels.indexed_iter() {
        if label > 0 && label <= num_labels {
            pixels[(label - 1) as usize].push((r, c));
        }
    }

    pixels
        .into_iter()
        .enumerate()
        .filter(|(_, px)| !px.is_empty())
        .map(|(idx, px)| {
            let y_min = px.iter().map(|p| p.0).min().unwrap_or(0);
            let y_max = px.iter().map(|p| p.0).max().unwrap_or(0);
            let x_min = px.iter().map(|p| p.1).min().unwrap_or(0);
            let x_max = px.iter().map(|p| p.1).max().unwrap_or(0);
            Region {
                label: idx as u32 + 1,
                bbox: BoundingBox::new(x_min, y_min, x_max - x_min + 1, y_max - y_min + 1),
                pixels: px,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_apply_threshold() {
        let image = arr2(&[[0.1, 0.9], [0.8, 0.2]]);

        let mask = apply_threshold(image.view(), 0.5, None);

        assert!(!mask[[0, 0]]);
        assert!(mask[[0, 1]]);
        assert!(mask[[1, 0]]);
        assert!(!mask[[1, 1]]);
    }

    #[test]
    fn test_apply_threshold_respects_validity() {
        let image = arr2(&[[0.9, 0.9], [0.9, 0.2]]);
        let valid = arr2(&[[true, false], [true, true]]);

        let mask = apply_threshold(image.view(), 0.5, Some(valid.view()));

        assert!(mask[[0, 0]]);
        assert!(!mask[[0, 1]]);
        assert!(mask[[1, 0]]);
    }

    #[test]
    fn test_valid_pixel_mask() {
        let image = arr2(&[[0.0, 1.0], [f64::NAN, -2.0]]);
        let valid = valid_pixel_mask(image.view());
        assert_eq!(valid, arr2(&[[false, true], [false, true]]));
    }

    #[test]
    fn test_connected_components() {
        let mask = arr2(&[
            [false, true, true, false],
            [false, true, false, false],
            [false, false, false, true],
            [false, false, true, true],
        ]);

        let (labels, num_labels) = connected_components(mask.view());

        // Diagonal contact between (1,1) and (2,2) is absent, so two components
        assert_eq!(num_labels, 2);
        assert_eq!(labels[[0, 1]], 1);
        assert_eq!(labels[[0, 1]], labels[[1, 1]]);
        assert_eq!(labels[[2, 3]], 2);
        assert_eq!(labels[[2, 3]], labels[[3, 2]]);
    }

    #[test]
    fn test_diagonal_pixels_join() {
        let mask = arr2(&[[true, false], [false, true]]);
        let (_, num_labels) = connected_components(mask.view());
        assert_eq!(num_labels, 1);
    }

    #[test]
    fn test_label_regions() {
        let labels = arr2(&[[1, 1, 0, 0], [1, 1, 0, 0], [0, 0, 0, 2], [0, 0, 2, 2]]);

        let regions = label_regions(labels.view(), 2);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].bbox, BoundingBox::new(0, 0, 2, 2));
        assert_eq!(regions[0].area(), 4);
        assert_eq!(regions[1].bbox, BoundingBox::new(2, 2, 2, 2));
        assert_eq!(regions[1].area(), 3);
        assert!(regions[1].mask((4, 4))[[3, 2]]);
    }

    #[test]
    fn test_region_max_value() {
        let labels = arr2(&[[1, 0], [1, 0]]);
        let values = arr2(&[[2.0, 50.0], [7.0, 1.0]]);
        let regions = label_regions(labels.view(), 1);
        assert_eq!(regions[0].max_value(values.view()), 7.0);
    }
}
