//! Synthetic source patterns for pipeline validation
//!
//! Provides Gaussian spots and multi-channel cubes built from scaled copies of
//! a single spot. Cubes use `(row, col, channel)` axis order.

use ndarray::{Array2, Array3, Axis, ShapeError};
use rand_distr::NormalError;

use super::noise::add_gaussian_noise;

/// Generate a circular 2D Gaussian spot
///
/// # Arguments
/// * `shape` - Output (height, width)
/// * `center` - Spot centre as (row, col)
/// * `sigma` - Gaussian width in pixels
/// * `amplitude` - Peak value at the centre
///
/// # Returns
/// Array2 with `amplitude * exp(-d² / 2σ²)` at every pixel
pub fn gaussian_spot(
    shape: (usize, usize),
    center: (f64, f64),
    sigma: f64,
    amplitude: f64,
) -> Array2<f64> {
    let two_sigma_sq = 2.0 * sigma * sigma;
    Array2::from_shape_fn(shape, |(r, c)| {
        let dr = r as f64 - center.0;
        let dc = c as f64 - center.1;
        amplitude * (-(dr * dr + dc * dc) / two_sigma_sq).exp()
    })
}

/// Stack equally shaped channel images into a `(row, col, channel)` cube
///
/// Fails if the channels differ in shape or the list is empty.
pub fn stack_channels(channels: &[Array2<f64>]) -> Result<Array3<f64>, ShapeError> {
    let views: Vec<_> = channels.iter().map(|c| c.view()).collect();
    ndarray::stack(Axis(2), &views)
}

/// Square cube with a centred Gaussian spot scaled per channel
///
/// # Arguments
/// * `size` - Side length in pixels; the spot sits at `(size/2, size/2)`
/// * `sigma` - Gaussian width in pixels
/// * `amplitude` - Peak value of the unscaled spot
/// * `scales` - One multiplicative factor per channel
pub fn gaussian_cube(size: usize, sigma: f64, amplitude: f64, scales: &[f64]) -> Array3<f64> {
    let center = ((size / 2) as f64, (size / 2) as f64);
    let spot = gaussian_spot((size, size), center, sigma, amplitude);
    Array3::from_shape_fn((size, size, scales.len()), |(r, c, k)| spot[[r, c]] * scales[k])
}

/// Like [`gaussian_cube`] with independent seeded Gaussian noise per channel
///
/// Channel `k` uses seed `seed + k`.
pub fn noisy_gaussian_cube(
    size: usize,
    sigma: f64,
    amplitude: f64,
    scales: &[f64],
    noise_std: f64,
    seed: u64,
) -> Result<Array3<f64>, NormalError> {
    let mut cube = gaussian_cube(size, sigma, amplitude, scales);
    for (k, mut channel) in cube.axis_iter_mut(Axis(2)).enumerate() {
        let noisy = add_gaussian_noise(channel.view(), noise_std, seed + k as u64)?;
        channel.assign(&noisy);
    }
    Ok(cube)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_spot_peak_and_falloff() {
        let spot = gaussian_spot((21, 21), (10.0, 10.0), 2.0, 50.0);
        assert_eq!(spot[[10, 10]], 50.0);
        assert_relative_eq!(spot[[10, 12]], 50.0 * (-0.5_f64).exp(), epsilon = 1e-12);
        assert_eq!(spot[[8, 10]], spot[[12, 10]]);
    }

    #[test]
    fn test_gaussian_cube_scales() {
        let cube = gaussian_cube(16, 2.0, 10.0, &[1.0, 0.5, 0.2]);
        assert_eq!(cube.dim(), (16, 16, 3));
        assert_eq!(cube[[8, 8, 0]], 10.0);
        assert_eq!(cube[[8, 8, 1]], 5.0);
        assert_relative_eq!(cube[[8, 8, 2]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stack_channels() {
        let a = Array2::from_elem((3, 4), 1.0);
        let b = Array2::from_elem((3, 4), 2.0);
        let cube = stack_channels(&[a.clone(), b]).unwrap();
        assert_eq!(cube.dim(), (3, 4, 2));
        assert_eq!(cube[[2, 3, 1]], 2.0);

        let wrong = Array2::from_elem((4, 4), 1.0);
        assert!(stack_channels(&[a, wrong]).is_err());
        assert!(stack_channels(&[]).is_err());
    }

    #[test]
    fn test_noisy_cube_is_reproducible() {
        let a = noisy_gaussian_cube(16, 2.0, 10.0, &[1.0, 1.0], 0.5, 3).unwrap();
        let b = noisy_gaussian_cube(16, 2.0, 10.0, &[1.0, 1.0], 0.5, 3).unwrap();
        assert_eq!(a, b);
        // Different seed per channel
        assert_ne!(a.index_axis(Axis(2), 0), a.index_axis(Axis(2), 1));
    }
}
