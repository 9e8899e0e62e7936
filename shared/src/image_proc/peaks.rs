//! Local intensity maxima detection
//!
//! A pixel is a peak when it equals the maximum over a square footprint
//! centred on it and is strictly above an absolute threshold. Peaks are
//! returned brightest first; a peak within `min_distance` (Chebyshev) of a
//! brighter accepted peak is suppressed.

use ndarray::{Array2, ArrayView2};

/// Options for [`find_local_peaks`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakOptions {
    /// Side of the square maximum-filter footprint (odd)
    pub footprint: usize,
    /// Minimum allowed separation between accepted peaks
    pub min_distance: usize,
    /// Absolute threshold; defaults to the image minimum when `None`
    pub threshold_abs: Option<f64>,
    /// Drop peaks within `min_distance` pixels of the image border
    pub exclude_border: bool,
}

impl Default for PeakOptions {
    fn default() -> Self {
        Self {
            footprint: 3,
            min_distance: 2,
            threshold_abs: None,
            exclude_border: true,
        }
    }
}

/// Maximum over a `size × size` window, truncated at the image edges
fn maximum_filter(image: ArrayView2<f64>, size: usize) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let half = size / 2;
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let r0 = r.saturating_sub(half);
        let r1 = (r + half).min(rows - 1);
        let c0 = c.saturating_sub(half);
        let c1 = (c + half).min(cols - 1);
        let mut best = f64::NEG_INFINITY;
        for rr in r0..=r1 {
            for cc in c0..=c1 {
                best = best.max(image[[rr, cc]]);
            }
        }
        best
    })
}

/// Find local maxima as (row, col) coordinates, brightest first
pub fn find_local_peaks(image: ArrayView2<f64>, options: &PeakOptions) -> Vec<(usize, usize)> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    let first = image[[0, 0]];
    if image.iter().all(|&v| v == first) {
        return Vec::new();
    }

    let threshold = options
        .threshold_abs
        .unwrap_or_else(|| image.iter().copied().fold(f64::INFINITY, f64::min));

    let filtered = maximum_filter(image, options.footprint.max(1));
    let border = if options.exclude_border {
        options.min_distance
    } else {
        0
    };

    let mut candidates: Vec<(usize, usize)> = Vec::new();
    for r in border..rows.saturating_sub(border) {
        for c in border..cols.saturating_sub(border) {
            let v = image[[r, c]];
            if v == filtered[[r, c]] && v > threshold {
                candidates.push((r, c));
            }
        }
    }

    // Stable sort keeps raster order among equal intensities
    candidates.sort_by(|a, b| image[[b.0, b.1]].total_cmp(&image[[a.0, a.1]]));

    let mut accepted: Vec<(usize, usize)> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        let too_close = accepted.iter().any(|&(r, c)| {
            let dr = r.abs_diff(cand.0);
            let dc = c.abs_diff(cand.1);
            dr.max(dc) <= options.min_distance
        });
        if !too_close {
            accepted.push(cand);
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(rows: usize, cols: usize) -> Array2<f64> {
        Array2::zeros((rows, cols))
    }

    #[test]
    fn test_single_peak() {
        let mut image = blank(9, 9);
        image[[4, 4]] = 10.0;
        image[[4, 5]] = 5.0;

        let peaks = find_local_peaks(image.view(), &PeakOptions::default());
        assert_eq!(peaks, vec![(4, 4)]);
    }

    #[test]
    fn test_peaks_sorted_by_intensity() {
        let mut image = blank(12, 12);
        image[[3, 3]] = 4.0;
        image[[8, 8]] = 9.0;

        let peaks = find_local_peaks(image.view(), &PeakOptions::default());
        assert_eq!(peaks, vec![(8, 8), (3, 3)]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut image = blank(9, 9);
        image[[4, 4]] = 5.0;

        let options = PeakOptions {
            threshold_abs: Some(5.0),
            ..Default::default()
        };
        assert!(find_local_peaks(image.view(), &options).is_empty());
    }

    #[test]
    fn test_border_excluded() {
        let mut image = blank(9, 9);
        image[[1, 4]] = 10.0;

        assert!(find_local_peaks(image.view(), &PeakOptions::default()).is_empty());

        let options = PeakOptions {
            exclude_border: false,
            ..Default::default()
        };
        assert_eq!(find_local_peaks(image.view(), &options), vec![(1, 4)]);
    }

    #[test]
    fn test_min_distance_suppression() {
        let mut image = blank(12, 12);
        image[[5, 5]] = 10.0;
        image[[5, 8]] = 8.0; // 3 apart: survives with min_distance 2
        image[[8, 5]] = 6.0;

        let options = PeakOptions {
            footprint: 1,
            ..Default::default()
        };
        let peaks = find_local_peaks(image.view(), &options);
        assert_eq!(peaks, vec![(5, 5), (5, 8), (8, 5)]);

        let options = PeakOptions {
            footprint: 1,
            min_distance: 3,
            exclude_border: false,
            ..Default::default()
        };
        let peaks = find_local_peaks(image.view(), &options);
        assert_eq!(peaks, vec![(5, 5)]);
    }

    #[test]
    fn test_constant_image_has_no_peaks() {
        let image = Array2::from_elem((8, 8), 3.0);
        assert!(find_local_peaks(image.view(), &PeakOptions::default()).is_empty());
    }
}
