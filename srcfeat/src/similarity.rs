//! Structural similarity between channel pairs
//!
//! Each channel is min-max normalised over its valid pixels, the SSIM map of
//! every pair is computed with a small uniform window, and the map is
//! summarised by robust statistics and by its moments about the shared
//! anchor.

use log::{debug, warn};
use ndarray::{Array2, ArrayView2, Zip};

use shared::image_proc::ssim::{ssim_map, SsimParams};
use shared::image_proc::thresholding::valid_pixel_mask;
use shared::stats::{median, median_abs_deviation, StatsScan, MAD_NORMAL_SCALE};

use crate::cube::ImageCube;
use crate::geometry::{channel_pairs, PairIndex};
use crate::moments::{MomentComputer, MomentSet, ReferenceAnchor, SENTINEL};

/// Summary statistics of a map over its valid pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation
    pub std: f64,
    pub median: f64,
    /// Median absolute deviation scaled to a normal sigma
    pub mad: f64,
}

impl SummaryStats {
    /// All statistics set to the sentinel
    pub fn sentinel() -> Self {
        Self {
            mean: SENTINEL,
            min: SENTINEL,
            max: SENTINEL,
            std: SENTINEL,
            median: SENTINEL,
            mad: SENTINEL,
        }
    }

    /// Statistics of `values`, `None` when empty
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let scan = StatsScan::new(values);
        let (min, max, mean) = scan.min_max_mean().ok()?;
        Some(Self {
            mean,
            min,
            max,
            std: scan.std_dev(values).ok()?,
            median: median(values)?,
            mad: median_abs_deviation(values, MAD_NORMAL_SCALE)?,
        })
    }

    /// Values in output column order
    pub fn to_array(&self) -> [f64; 6] {
        [self.mean, self.min, self.max, self.std, self.median, self.mad]
    }
}

/// SSIM results of one channel pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairSimilarity {
    pub pair: PairIndex,
    /// SSIM map, negatives clipped and invalid pixels zeroed
    pub map: Array2<f64>,
    pub stats: SummaryStats,
    pub moments: MomentSet,
}

/// Min-max normalise the valid pixels of a channel to `[0, 1]`
///
/// Invalid pixels become 0, as does every pixel of a channel whose valid
/// range is empty or flat.
pub fn normalize_channel(channel: ArrayView2<f64>) -> Array2<f64> {
    let valid = valid_pixel_mask(channel);
    let (min, max) = channel
        .iter()
        .zip(valid.iter())
        .filter(|(_, &ok)| ok)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (&v, _)| {
            (lo.min(v), hi.max(v))
        });

    if !(max > min) {
        return Array2::zeros(channel.dim());
    }
    let range = max - min;
    Zip::from(channel)
        .and(&valid)
        .map_collect(|&v, &ok| if ok { (v - min) / range } else { 0.0 })
}

/// SSIM maps, statistics and moments for every channel pair
///
/// # Arguments
/// * `cube` - Image cube
/// * `anchor` - Shared mask and centroid for the map moments
/// * `computer` - Moment computer applied to every SSIM map
/// * `winsize` - Side of the uniform SSIM window
pub fn compute_similarity(
    cube: &ImageCube,
    anchor: &ReferenceAnchor,
    computer: &MomentComputer,
    winsize: usize,
) -> Vec<PairSimilarity> {
    let params = SsimParams {
        win_size: winsize,
        ..Default::default()
    };

    let normalized: Vec<Array2<f64>> = cube.channels().map(normalize_channel).collect();
    let valid: Vec<Array2<bool>> = cube.channels().map(valid_pixel_mask).collect();

    channel_pairs(cube.nchannels())
        .into_iter()
        .map(|pair| {
            let mut map = ssim_map(normalized[pair.i].view(), normalized[pair.j].view(), &params);
            let both = Zip::from(&valid[pair.i])
                .and(&valid[pair.j])
                .map_collect(|&a, &b| a && b);

            Zip::from(&mut map).and(&both).for_each(|s, &ok| {
                if !ok || *s < 0.0 {
                    *s = 0.0;
                }
            });

            let values: Vec<f64> = map
                .iter()
                .zip(both.iter())
                .filter(|(_, &ok)| ok)
                .map(|(&s, _)| s)
                .collect();

            let (stats, moments) = match SummaryStats::from_values(&values) {
                Some(stats) => {
                    debug!(
                        "SSIM {}: mean={:.4}, median={:.4}",
                        pair.suffix(),
                        stats.mean,
                        stats.median
                    );
                    (stats, computer.map_moments(map.view(), anchor))
                }
                None => {
                    warn!("SSIM {}: no valid pixels, using sentinels", pair.suffix());
                    (SummaryStats::sentinel(), MomentSet::sentinel())
                }
            };

            PairSimilarity {
                pair,
                map,
                stats,
                moments,
            }
        })
        .collect()
}
