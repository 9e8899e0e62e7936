//! Pixel-wise colour-index maps between channel pairs
//!
//! The colour index of a pixel is `log10(F_i) - log10(F_j)` after the
//! per-channel offsets are removed. Pixels that are unusable (non-positive
//! flux, low structural similarity, or an extreme index) are replaced by a
//! safe value and excluded from the statistics.

use log::{debug, warn};
use ndarray::{Array2, ArrayView2, Zip};

use shared::image_proc::thresholding::valid_pixel_mask;
use shared::stats::{excess_kurtosis, skewness};

use crate::config::{ColorIndexOptions, ConfigError};
use crate::cube::ImageCube;
use crate::geometry::{channel_pairs, PairIndex};
use crate::moments::{MomentComputer, MomentSet, ReferenceAnchor, SENTINEL};
use crate::similarity::{PairSimilarity, SummaryStats};

/// Statistics of a colour-index map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorIndexStats {
    pub summary: SummaryStats,
    /// Biased sample skewness
    pub skew: f64,
    /// Biased excess kurtosis
    pub kurt: f64,
}

impl ColorIndexStats {
    pub fn sentinel() -> Self {
        Self {
            summary: SummaryStats::sentinel(),
            skew: SENTINEL,
            kurt: SENTINEL,
        }
    }

    pub fn from_values(values: &[f64]) -> Option<Self> {
        Some(Self {
            summary: SummaryStats::from_values(values)?,
            skew: skewness(values),
            kurt: excess_kurtosis(values),
        })
    }

    /// Values in output column order
    pub fn to_array(&self) -> [f64; 8] {
        let s = &self.summary;
        [
            s.mean, s.min, s.max, s.std, s.median, s.mad, self.skew, self.kurt,
        ]
    }
}

/// Colour-index results of one channel pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairColorIndex {
    pub pair: PairIndex,
    /// Shifted colour index, invalid pixels set to the safe value
    pub map: Array2<f64>,
    pub stats: ColorIndexStats,
    pub moments: MomentSet,
}

/// `log10(a) - log10(b)` where `valid`, 0 elsewhere
///
/// Antisymmetric: swapping `a` and `b` negates the map.
pub fn log_ratio_map(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    valid: ArrayView2<bool>,
) -> Array2<f64> {
    Zip::from(a).and(b).and(valid).map_collect(|&x, &y, &ok| {
        if ok {
            x.log10() - y.log10()
        } else {
            0.0
        }
    })
}

/// Channel with its offset removed, invalid pixels zeroed
fn positive_part(channel: ArrayView2<f64>, offset: f64) -> Array2<f64> {
    let valid = valid_pixel_mask(channel);
    Zip::from(channel)
        .and(&valid)
        .map_collect(|&v, &ok| if ok { v - offset } else { 0.0 })
}

/// Colour-index maps, statistics and moments for every channel pair
///
/// # Arguments
/// * `cube` - Image cube
/// * `anchor` - Shared mask and centroid for the map moments
/// * `computer` - Moment computer applied to every colour-index map
/// * `ssim` - SSIM results in pair order, used for gating and weighting when present
/// * `opts` - Colour-index options
///
/// # Returns
/// One entry per pair, or a configuration error if `chan_mins` does not
/// match the channel count
pub fn compute_color_index(
    cube: &ImageCube,
    anchor: &ReferenceAnchor,
    computer: &MomentComputer,
    ssim: Option<&[PairSimilarity]>,
    opts: &ColorIndexOptions,
) -> Result<Vec<PairColorIndex>, ConfigError> {
    let nch = cube.nchannels();
    let offsets = if opts.chan_mins.is_empty() {
        vec![0.0; nch]
    } else if opts.chan_mins.len() == nch {
        opts.chan_mins.clone()
    } else {
        return Err(ConfigError::Invalid(format!(
            "chan_mins has {} entries for {nch} channels",
            opts.chan_mins.len()
        )));
    };

    let posdef: Vec<Array2<f64>> = cube
        .channels()
        .zip(offsets.iter())
        .map(|(ch, &offset)| positive_part(ch, offset))
        .collect();

    let thr = opts.colorind_thr;
    let safe = opts.colorind_safe;

    let results = channel_pairs(nch)
        .into_iter()
        .enumerate()
        .map(|(idx, pair)| {
            let ssim_map = ssim.and_then(|s| s.get(idx)).map(|s| &s.map);
            let (a, b) = (&posdef[pair.i], &posdef[pair.j]);

            let mut valid = Zip::from(a)
                .and(b)
                .map_collect(|&x, &y| x.is_finite() && x > 0.0 && y.is_finite() && y > 0.0);
            if let (Some(map), Some(t)) = (ssim_map, opts.ssim_thr) {
                Zip::from(&mut valid)
                    .and(map)
                    .for_each(|ok, &s| *ok = *ok && s > t);
            }

            let mut cind = log_ratio_map(a.view(), b.view(), valid.view());
            Zip::from(&mut valid)
                .and(&cind)
                .for_each(|ok, &c| *ok = *ok && c.abs() < thr);

            cind += thr;
            if opts.weight_colmap_with_ssim {
                if let Some(map) = ssim_map {
                    cind *= map;
                }
            }
            Zip::from(&mut cind).and(&valid).for_each(|c, &ok| {
                if !ok {
                    *c = safe;
                }
            });

            let values: Vec<f64> = cind
                .iter()
                .copied()
                .filter(|c| c.is_finite() && *c != safe)
                .collect();

            let (stats, moments) = match ColorIndexStats::from_values(&values) {
                Some(stats) => {
                    debug!(
                        "Colour index {}: mean={:.4}, npix={}",
                        pair.suffix(),
                        stats.summary.mean,
                        values.len()
                    );
                    (stats, computer.map_moments(cind.view(), anchor))
                }
                None => {
                    warn!("Colour index {}: no valid pixels, using sentinels", pair.suffix());
                    (ColorIndexStats::sentinel(), MomentSet::sentinel())
                }
            };

            PairColorIndex {
                pair,
                map: cind,
                stats,
                moments,
            }
        })
        .collect();

    Ok(results)
}
