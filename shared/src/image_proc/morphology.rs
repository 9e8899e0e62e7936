//! Binary morphology on boolean masks
//!
//! Provides the elliptical structuring element and single-pass dilation used
//! to grow a source mask around its detected footprint.

use ndarray::{Array2, ArrayView2};

/// Elliptical structuring element inscribed in a `size × size` box.
///
/// Row `i` spans the columns `c - dx ..= c + dx` with
/// `dx = round(c * sqrt(1 - (i - r)² / r²))`, where `r = c = size / 2`.
/// A size of 0 or 1 yields a single set pixel.
///
/// # Arguments
/// * `size` - Side length of the kernel
///
/// # Returns
/// Boolean kernel of shape `(size, size)`
pub fn elliptical_kernel(size: usize) -> Array2<bool> {
    let size = size.max(1);
    let half = (size / 2) as isize;
    if half == 0 {
        return Array2::from_elem((size, size), true);
    }

    let r = half as f64;
    let mut kernel = Array2::from_elem((size, size), false);
    for i in 0..size {
        let dy = i as isize - half;
        if dy.abs() > half {
            continue;
        }
        let dx = (r * ((r * r - (dy * dy) as f64) / (r * r)).sqrt()).round() as isize;
        let j0 = (half - dx).max(0) as usize;
        let j1 = ((half + dx + 1) as usize).min(size);
        for j in j0..j1 {
            kernel[[i, j]] = true;
        }
    }
    kernel
}

/// Dilate a mask once with the given structuring element.
///
/// The kernel anchor is its centre; pixels beyond the border count as unset.
pub fn dilate(mask: ArrayView2<bool>, kernel: ArrayView2<bool>) -> Array2<bool> {
    let (rows, cols) = mask.dim();
    let (krows, kcols) = kernel.dim();
    let ar = (krows / 2) as isize;
    let ac = (kcols / 2) as isize;

    let offsets: Vec<(isize, isize)> = kernel
        .indexed_iter()
        .filter(|(_, &set)| set)
        .map(|((r, c), _)| (r as isize - ar, c as isize - ac))
        .collect();

    let mut out = Array2::from_elem((rows, cols), false);
    for ((r, c), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        for &(dr, dc) in &offsets {
            let nr = r as isize + dr;
            let nc = c as isize + dc;
            if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                out[[nr as usize, nc as usize]] = true;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_elliptical_kernel_5() {
        let k = elliptical_kernel(5);
        let expected = arr2(&[
            [false, false, true, false, false],
            [true, true, true, true, true],
            [true, true, true, true, true],
            [true, true, true, true, true],
            [false, false, true, false, false],
        ]);
        assert_eq!(k, expected);
    }

    #[test]
    fn test_elliptical_kernel_3_is_full() {
        let k = elliptical_kernel(3);
        assert_eq!(k.iter().filter(|&&v| v).count(), 5);
        assert!(k[[1, 1]] && k[[0, 1]] && k[[1, 0]]);
        assert!(!k[[0, 0]]);
    }

    #[test]
    fn test_single_pixel_kernel() {
        let k = elliptical_kernel(1);
        assert_eq!(k, arr2(&[[true]]));
    }

    #[test]
    fn test_dilate_point() {
        let mut mask = Array2::from_elem((7, 7), false);
        mask[[3, 3]] = true;
        let kernel = elliptical_kernel(3);
        let out = dilate(mask.view(), kernel.view());

        assert_eq!(out.iter().filter(|&&v| v).count(), 5);
        assert!(out[[2, 3]] && out[[4, 3]] && out[[3, 2]] && out[[3, 4]]);
        assert!(!out[[2, 2]]);
    }

    #[test]
    fn test_dilate_clips_at_border() {
        let mut mask = Array2::from_elem((4, 4), false);
        mask[[0, 0]] = true;
        let kernel = elliptical_kernel(5);
        let out = dilate(mask.view(), kernel.view());
        assert!(out[[0, 2]]);
        assert!(out[[1, 1]]);
        assert!(!out[[2, 2]]);
    }

    #[test]
    fn test_dilate_preserves_mask() {
        let mask = arr2(&[[false, true, false], [false, false, false]]);
        let out = dilate(mask.view(), elliptical_kernel(3).view());
        assert!(out[[0, 1]]);
    }
}
