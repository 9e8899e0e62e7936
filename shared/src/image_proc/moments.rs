//! Image moments for shape characterization
//!
//! Raw, central and scale-normalized moments follow the usual definitions
//! with `p` the row (axis 0) order and `q` the column (axis 1) order:
//!
//! - raw: `m_pq = Σ rᵖ cᵍ I(r, c)`
//! - central: `μ_pq = Σ (r - r̄)ᵖ (c - c̄)ᵍ I(r, c)` about a supplied centroid
//! - normalized: `ν_pq = μ_pq / μ_00^((p+q)/2 + 1)` for `p + q ≥ 2`
//!
//! Hu's seven invariants are derived from the third-order normalized moments.
//! Zernike moment magnitudes up to degree 4 are computed on the unit disk of a
//! given radius around the centroid, using only positive pixels normalized to
//! unit total weight.
//!
//! Non-finite pixels contribute zero to every moment.

use std::f64::consts::PI;

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

/// Highest moment order kept for central and normalized moments
pub const MOMENT_ORDER: usize = 3;

/// Number of central moments kept, `(MOMENT_ORDER + 1)²`
pub const NUM_CENTRAL_MOMENTS: usize = (MOMENT_ORDER + 1) * (MOMENT_ORDER + 1);

/// Number of Hu invariants
pub const NUM_HU_MOMENTS: usize = 7;

/// Maximum Zernike polynomial degree
pub const ZERNIKE_DEGREE: usize = 4;

/// Number of Zernike magnitudes up to [`ZERNIKE_DEGREE`]
pub const NUM_ZERNIKE_MOMENTS: usize = 9;

/// Errors from moment computations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MomentsError {
    #[error("Zernike radius must be positive and finite, got {0}")]
    InvalidRadius(f64),
    #[error("No positive pixels inside the Zernike unit disk")]
    EmptyDisk,
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Raw moments up to first order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMoments {
    /// Total intensity
    pub m00: f64,
    /// First moment along rows
    pub m10: f64,
    /// First moment along columns
    pub m01: f64,
}

impl RawMoments {
    /// Compute raw moments over every pixel of the image
    pub fn calculate(image: ArrayView2<f64>) -> Self {
        let mut m00 = 0.0;
        let mut m10 = 0.0;
        let mut m01 = 0.0;

        for ((r, c), &v) in image.indexed_iter() {
            let v = finite_or_zero(v);
            m00 += v;
            m10 += r as f64 * v;
            m01 += c as f64 * v;
        }

        Self { m00, m10, m01 }
    }

    /// Intensity-weighted centroid as (row, col)
    ///
    /// Not finite when the total intensity is zero.
    pub fn centroid(&self) -> (f64, f64) {
        (self.m10 / self.m00, self.m01 / self.m00)
    }
}

/// Central moments about `centroid` (row, col) up to `order`
///
/// # Returns
/// Array of shape `(order + 1, order + 1)` indexed `[p, q]`
pub fn central_moments(image: ArrayView2<f64>, centroid: (f64, f64), order: usize) -> Array2<f64> {
    let mut mu = Array2::zeros((order + 1, order + 1));

    for ((r, c), &v) in image.indexed_iter() {
        let v = finite_or_zero(v);
        if v == 0.0 {
            continue;
        }
        let dr = r as f64 - centroid.0;
        let dc = c as f64 - centroid.1;

        let mut dr_p = 1.0;
        for p in 0..=order {
            let mut dc_q = 1.0;
            for q in 0..=order {
                mu[[p, q]] += v * dr_p * dc_q;
                dc_q *= dc;
            }
            dr_p *= dr;
        }
    }

    mu
}

/// Scale-normalized moments from central moments
///
/// Entries with `p + q < 2` are undefined and set to NaN.
pub fn normalized_moments(mu: ArrayView2<f64>) -> Array2<f64> {
    let (rows, cols) = mu.dim();
    let mu00 = mu[[0, 0]];
    Array2::from_shape_fn((rows, cols), |(p, q)| {
        if p + q < 2 {
            f64::NAN
        } else {
            mu[[p, q]] / mu00.powf((p + q) as f64 / 2.0 + 1.0)
        }
    })
}

/// Hu's seven rotation-invariant moments from normalized moments of order ≥ 3
pub fn hu_moments(nu: ArrayView2<f64>) -> [f64; NUM_HU_MOMENTS] {
    let nu20 = nu[[2, 0]];
    let nu02 = nu[[0, 2]];
    let nu11 = nu[[1, 1]];
    let nu30 = nu[[3, 0]];
    let nu03 = nu[[0, 3]];
    let nu21 = nu[[2, 1]];
    let nu12 = nu[[1, 2]];

    let mut hu = [0.0; NUM_HU_MOMENTS];

    let mut t0 = nu30 + nu12;
    let mut t1 = nu21 + nu03;
    let q0 = t0 * t0;
    let q1 = t1 * t1;
    let n4 = 4.0 * nu11;
    let s = nu20 + nu02;
    let d = nu20 - nu02;

    hu[0] = s;
    hu[1] = d * d + n4 * nu11;
    hu[3] = q0 + q1;
    hu[5] = d * (q0 - q1) + n4 * t0 * t1;

    t0 *= q0 - 3.0 * q1;
    t1 *= 3.0 * q0 - q1;

    let r0 = nu30 - 3.0 * nu12;
    let r1 = 3.0 * nu21 - nu03;

    hu[2] = r0 * r0 + r1 * r1;
    hu[4] = r0 * t0 + r1 * t1;
    hu[6] = r1 * t0 - r0 * t1;

    hu
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// Radial polynomial coefficients of `V_nl`, indexed by `m`
fn radial_coefficients(n: usize, l: usize) -> Vec<f64> {
    (0..=(n - l) / 2)
        .map(|m| {
            let sign = if m % 2 == 1 { -1.0 } else { 1.0 };
            sign * factorial(n - m)
                / (factorial(m) * factorial((n - 2 * m + l) / 2) * factorial((n - 2 * m - l) / 2))
        })
        .collect()
}

/// Ordered (n, l) pairs of the Zernike basis up to [`ZERNIKE_DEGREE`]
pub fn zernike_indices() -> Vec<(usize, usize)> {
    (0..=ZERNIKE_DEGREE)
        .flat_map(|n| (0..=n).filter(move |l| (n - l) % 2 == 0).map(move |l| (n, l)))
        .collect()
}

/// Zernike moment magnitudes up to degree 4
///
/// Pixels within `radius` of `centroid` (row, col) with positive intensity
/// are used, weighted by their share of the total intensity in the disk.
/// Magnitudes are returned in `(n, l)` order `00, 11, 20, 22, 31, 33, 40, 42, 44`.
///
/// # Arguments
/// * `image` - Intensity image
/// * `radius` - Disk radius in pixels
/// * `centroid` - Disk centre as (row, col)
///
/// # Returns
/// Nine magnitudes, or an error for a bad radius or an empty disk
pub fn zernike_moments(
    image: ArrayView2<f64>,
    radius: f64,
    centroid: (f64, f64),
) -> Result<[f64; NUM_ZERNIKE_MOMENTS], MomentsError> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(MomentsError::InvalidRadius(radius));
    }

    // (x, y, distance, weight) of every contributing pixel
    let mut samples: Vec<(f64, f64, f64, f64)> = Vec::new();
    for ((r, c), &v) in image.indexed_iter() {
        if !(v.is_finite() && v > 0.0) {
            continue;
        }
        let y = (r as f64 - centroid.0) / radius;
        let x = (c as f64 - centroid.1) / radius;
        let d = (x * x + y * y).sqrt().max(1e-9);
        if d <= 1.0 {
            samples.push((x, y, d, v));
        }
    }

    let total: f64 = samples.iter().map(|s| s.3).sum();
    if samples.is_empty() || total <= 0.0 {
        return Err(MomentsError::EmptyDisk);
    }

    let mut out = [0.0; NUM_ZERNIKE_MOMENTS];
    for (slot, (n, l)) in out.iter_mut().zip(zernike_indices()) {
        let coeffs = radial_coefficients(n, l);
        let mut re = 0.0;
        let mut im = 0.0;

        for &(x, y, d, v) in &samples {
            let radial: f64 = coeffs
                .iter()
                .enumerate()
                .map(|(m, g)| g * d.powi((n - 2 * m) as i32))
                .sum();

            // conj((x + iy)/d)^l = exp(-i l θ)
            let theta = y.atan2(x);
            let (sin_l, cos_l) = (l as f64 * theta).sin_cos();
            let w = v / total * radial;
            re += w * cos_l;
            im -= w * sin_l;
        }

        *slot = (n as f64 + 1.0) / PI * (re * re + im * im).sqrt();
    }

    Ok(out)
}
