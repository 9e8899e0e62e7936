//! Structural similarity (SSIM) maps
//!
//! Local means, variances and covariance are estimated with a uniform
//! `win_size × win_size` window using reflect (half-sample symmetric)
//! boundary handling. Variances use the sample normalization `N / (N - 1)`.
//! The full per-pixel similarity map is returned.

use ndarray::{Array2, ArrayView2, Zip};

/// Parameters of the SSIM computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsimParams {
    /// Side of the uniform window (odd, at least 3)
    pub win_size: usize,
    /// Dynamic range of the input images
    pub data_range: f64,
    /// Luminance stabilization constant factor
    pub k1: f64,
    /// Contrast stabilization constant factor
    pub k2: f64,
}

impl Default for SsimParams {
    fn default() -> Self {
        Self {
            win_size: 3,
            data_range: 1.0,
            k1: 0.01,
            k2: 0.03,
        }
    }
}

/// Map an out-of-range index into `0..len` with half-sample reflection
fn reflect_index(i: isize, len: usize) -> usize {
    let n = len as isize;
    if n == 1 {
        return 0;
    }
    let period = 2 * n;
    let mut k = i.rem_euclid(period);
    if k >= n {
        k = period - 1 - k;
    }
    k as usize
}

/// Uniform (box) filter with reflect boundary handling
pub fn uniform_filter(image: ArrayView2<f64>, size: usize) -> Array2<f64> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Array2::zeros((rows, cols));
    }
    let half = (size / 2) as isize;
    let norm = 1.0 / size as f64;

    // Separable: rows first, then columns
    let horizontal = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut acc = 0.0;
        for k in -half..=half {
            acc += image[[r, reflect_index(c as isize + k, cols)]];
        }
        acc * norm
    });

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut acc = 0.0;
        for k in -half..=half {
            acc += horizontal[[reflect_index(r as isize + k, rows), c]];
        }
        acc * norm
    })
}

/// Per-pixel structural similarity of two equally shaped images
///
/// # Arguments
/// * `x` - First image
/// * `y` - Second image
/// * `params` - Window and stabilization constants
///
/// # Returns
/// SSIM map of the same shape as the inputs
pub fn ssim_map(x: ArrayView2<f64>, y: ArrayView2<f64>, params: &SsimParams) -> Array2<f64> {
    assert_eq!(x.dim(), y.dim(), "SSIM inputs must have the same shape");

    let win = params.win_size;
    let np = (win * win) as f64;
    let cov_norm = np / (np - 1.0);

    let xx = &x * &x;
    let yy = &y * &y;
    let xy = &x * &y;

    let ux = uniform_filter(x, win);
    let uy = uniform_filter(y, win);
    let uxx = uniform_filter(xx.view(), win);
    let uyy = uniform_filter(yy.view(), win);
    let uxy = uniform_filter(xy.view(), win);

    let c1 = (params.k1 * params.data_range).powi(2);
    let c2 = (params.k2 * params.data_range).powi(2);

    let mut out = Array2::zeros(x.dim());
    Zip::from(&mut out)
        .and(&ux)
        .and(&uy)
        .and(&uxx)
        .and(&uyy)
        .and(&uxy)
        .for_each(|s, &mx, &my, &mxx, &myy, &mxy| {
            let vx = cov_norm * (mxx - mx * mx);
            let vy = cov_norm * (myy - my * my);
            let vxy = cov_norm * (mxy - mx * my);

            let a1 = 2.0 * mx * my + c1;
            let a2 = 2.0 * vxy + c2;
            let b1 = mx * mx + my * my + c1;
            let b2 = vx + vy + c2;
            *s = (a1 * a2) / (b1 * b2);
        });

    out
}
