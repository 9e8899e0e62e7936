//! Statistics over floating point pixel samples
//!
//! [`StatsScan`] computes min, max, mean, and optionally variance/std_dev from a
//! slice of floating point numbers. Min, max, and mean are computed in a single
//! pass, while variance requires a second pass with the data.
//!
//! The free functions cover the robust estimators used on astronomical cutouts:
//! medians, median absolute deviation, sigma-clipped background statistics and
//! the (biased) third/fourth standardized moments.

use log::trace;
use num_traits::float::Float;
use std::fmt;
use thiserror::Error;

/// Scale factor making the MAD a consistent estimator of a normal sigma.
pub const MAD_NORMAL_SCALE: f64 = 1.4826;

/// Default number of sigma-clipping iterations.
pub const DEFAULT_CLIP_ITERATIONS: usize = 5;

/// Error types for StatsScan operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("NaN value encountered at index {0}")]
    NaNEncountered(usize),
    #[error("No data provided (empty slice)")]
    NoData,
}

/// A scanner for statistics over floating point data
///
/// Computes min, max and mean in a single pass.
/// Variance and standard deviation require a second pass with the original data.
#[derive(Debug, Clone)]
pub struct StatsScan<T: Float> {
    min_value: Option<T>,
    max_value: Option<T>,
    sum: T,
    count: usize,
    nan_index: Option<usize>,
}

impl<T: Float + fmt::Debug> StatsScan<T> {
    /// Create a new StatsScan by computing statistics from a slice of values
    ///
    /// This performs a single pass to compute min, max, sum, and count.
    /// Scanning stops at the first NaN, which every accessor then reports.
    pub fn new(data: &[T]) -> Self {
        let mut min_value = None;
        let mut max_value = None;
        let mut sum = T::zero();
        let mut count = 0usize;
        let mut nan_index = None;

        for (index, &value) in data.iter().enumerate() {
            if value.is_nan() {
                nan_index = Some(index);
                break;
            }

            sum = sum + value;
            count += 1;

            match (min_value, max_value) {
                (None, None) => {
                    min_value = Some(value);
                    max_value = Some(value);
                }
                (Some(min), Some(max)) => {
                    if value < min {
                        min_value = Some(value);
                    }
                    if value > max {
                        max_value = Some(value);
                    }
                }
                _ => unreachable!("min and max should always be in sync"),
            }
        }

        Self {
            min_value,
            max_value,
            sum,
            count,
            nan_index,
        }
    }

    /// Get the minimum value
    pub fn min(&self) -> Result<T, StatsError> {
        if let Some(index) = self.nan_index {
            Err(StatsError::NaNEncountered(index))
        } else {
            self.min_value.ok_or(StatsError::NoData)
        }
    }

    /// Get the maximum value
    pub fn max(&self) -> Result<T, StatsError> {
        if let Some(index) = self.nan_index {
            Err(StatsError::NaNEncountered(index))
        } else {
            self.max_value.ok_or(StatsError::NoData)
        }
    }

    /// Get both min and max values as a tuple
    pub fn min_max(&self) -> Result<(T, T), StatsError> {
        Ok((self.min()?, self.max()?))
    }

    /// Get the arithmetic mean of the data
    pub fn mean(&self) -> Result<T, StatsError> {
        if let Some(index) = self.nan_index {
            Err(StatsError::NaNEncountered(index))
        } else if self.count == 0 {
            Err(StatsError::NoData)
        } else {
            Ok(self.sum / T::from(self.count).unwrap_or_else(T::one))
        }
    }

    /// Get the count of values processed
    pub fn count(&self) -> usize {
        self.count
    }

    /// Compute the population variance (second pass required)
    ///
    /// `data` must be the same slice that was handed to `new()`.
    pub fn variance(&self, data: &[T]) -> Result<T, StatsError> {
        let mean = self.mean()?;
        let n = T::from(self.count).unwrap_or_else(T::one);

        let sum_squared_diff = data
            .iter()
            .take(self.count)
            .map(|&x| {
                let diff = x - mean;
                diff * diff
            })
            .fold(T::zero(), |acc, x| acc + x);

        Ok(sum_squared_diff / n)
    }

    /// Compute the population standard deviation (second pass required)
    pub fn std_dev(&self, data: &[T]) -> Result<T, StatsError> {
        Ok(self.variance(data)?.sqrt())
    }

    /// Get min, max, and mean as a tuple (all from first pass)
    pub fn min_max_mean(&self) -> Result<(T, T, T), StatsError> {
        Ok((self.min()?, self.max()?, self.mean()?))
    }
}

/// Median of a sample, averaging the two central values for even lengths.
///
/// Returns `None` for an empty sample. NaNs sort last and are not filtered,
/// callers hand in finite values only.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 0 {
        Some(0.5 * (sorted[n / 2 - 1] + sorted[n / 2]))
    } else {
        Some(sorted[n / 2])
    }
}

/// Median absolute deviation about the median, multiplied by `scale`.
///
/// Use [`MAD_NORMAL_SCALE`] to obtain a normal-consistent sigma estimate.
pub fn median_abs_deviation(values: &[f64], scale: f64) -> Option<f64> {
    let center = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations).map(|m| m * scale)
}

/// Central moment of order `order` about the sample mean (population normalization).
fn central_moment(values: &[f64], mean: f64, order: i32) -> f64 {
    values.iter().map(|v| (v - mean).powi(order)).sum::<f64>() / values.len() as f64
}

/// Biased sample skewness `m3 / m2^1.5`.
///
/// NaN when the sample is empty or has zero variance.
pub fn skewness(values: &[f64]) -> f64 {
    let Ok(mean) = StatsScan::new(values).mean() else {
        return f64::NAN;
    };
    let m2 = central_moment(values, mean, 2);
    if m2 <= 0.0 {
        return f64::NAN;
    }
    central_moment(values, mean, 3) / m2.powf(1.5)
}

/// Biased excess (Fisher) kurtosis `m4 / m2^2 - 3`.
///
/// NaN when the sample is empty or has zero variance.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let Ok(mean) = StatsScan::new(values).mean() else {
        return f64::NAN;
    };
    let m2 = central_moment(values, mean, 2);
    if m2 <= 0.0 {
        return f64::NAN;
    }
    central_moment(values, mean, 4) / (m2 * m2) - 3.0
}

/// Result of iterative sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedStats {
    /// Mean of the surviving samples
    pub mean: f64,
    /// Median of the surviving samples
    pub median: f64,
    /// Population standard deviation of the surviving samples
    pub std_dev: f64,
    /// Number of samples that survived clipping
    pub n_kept: usize,
}

/// Sigma-clipped mean, median and standard deviation.
///
/// Each iteration keeps samples inside `median ± sigma * std` of the current
/// set; iteration stops once nothing more is rejected or after `max_iters`
/// rounds. The statistics of the final set are returned.
///
/// # Errors
/// * `StatsError::NoData` - empty input
/// * `StatsError::NaNEncountered` - a NaN sample was found
pub fn sigma_clipped_stats(
    values: &[f64],
    sigma: f64,
    max_iters: usize,
) -> Result<ClippedStats, StatsError> {
    let scan = StatsScan::new(values);
    scan.min_max()?;

    let mut kept = values.to_vec();
    for iter in 0..max_iters {
        let center = median(&kept).ok_or(StatsError::NoData)?;
        let std_dev = StatsScan::new(&kept).std_dev(&kept)?;
        let lo = center - sigma * std_dev;
        let hi = center + sigma * std_dev;

        let before = kept.len();
        kept.retain(|&v| v >= lo && v <= hi);
        trace!(
            "Clip iteration {iter}: kept {} of {before} in [{lo}, {hi}]",
            kept.len()
        );
        if kept.len() == before || kept.is_empty() {
            break;
        }
    }

    let scan = StatsScan::new(&kept);
    Ok(ClippedStats {
        mean: scan.mean()?,
        median: median(&kept).ok_or(StatsError::NoData)?,
        std_dev: scan.std_dev(&kept)?,
        n_kept: kept.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_stats_f64() {
        let scanner = StatsScan::<f64>::new(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]);

        assert_eq!(scanner.min().unwrap(), 1.0);
        assert_eq!(scanner.max().unwrap(), 9.0);
        assert_eq!(scanner.count(), 8);
        assert_relative_eq!(scanner.mean().unwrap(), 3.875, epsilon = 1e-12);
    }

    #[test]
    fn test_variance_and_std_dev() {
        // Mean = 5, Variance = 4, StdDev = 2
        let data = [2.0_f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let scanner = StatsScan::new(&data);

        assert_relative_eq!(scanner.variance(&data).unwrap(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(scanner.std_dev(&data).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_handling() {
        let scanner = StatsScan::<f64>::new(&[1.0, 2.0, f64::NAN, 3.0]);

        assert_eq!(scanner.mean(), Err(StatsError::NaNEncountered(2)));
    }

    #[test]
    fn test_no_data() {
        let scanner = StatsScan::<f64>::new(&[]);
        assert_eq!(scanner.min(), Err(StatsError::NoData));
        assert_eq!(scanner.mean(), Err(StatsError::NoData));
    }

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mad_scaled() {
        // deviations from median 3: [2,1,0,1,2] -> median 1
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(median_abs_deviation(&values, 1.0).unwrap(), 1.0);
        assert_relative_eq!(
            median_abs_deviation(&values, MAD_NORMAL_SCALE).unwrap(),
            1.4826
        );
    }

    #[test]
    fn test_skew_kurtosis_symmetric() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(skewness(&values), 0.0, epsilon = 1e-12);
        // m2 = 2, m4 = 6.8 -> 6.8/4 - 3 = -1.3
        assert_relative_eq!(excess_kurtosis(&values), -1.3, epsilon = 1e-12);
    }

    #[test]
    fn test_skew_of_constant_is_nan() {
        assert!(skewness(&[2.0, 2.0, 2.0]).is_nan());
        assert!(excess_kurtosis(&[2.0, 2.0, 2.0]).is_nan());
    }

    #[test]
    fn test_sigma_clip_rejects_outlier() {
        let mut values = vec![10.0; 50];
        for (i, v) in values.iter_mut().enumerate() {
            *v += (i % 5) as f64 * 0.1;
        }
        values.push(1000.0);

        let stats = sigma_clipped_stats(&values, 3.0, DEFAULT_CLIP_ITERATIONS).unwrap();
        assert_eq!(stats.n_kept, 50);
        assert_relative_eq!(stats.median, 10.2, epsilon = 1e-12);
        assert!(stats.std_dev < 0.2);
    }

    #[test]
    fn test_sigma_clip_empty() {
        assert_eq!(
            sigma_clipped_stats(&[], 3.0, DEFAULT_CLIP_ITERATIONS),
            Err(StatsError::NoData)
        );
    }
}
