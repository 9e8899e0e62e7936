//! Per-channel source finding
//!
//! Each channel is segmented independently:
//!
//! 1. Background statistics come from sigma-clipped valid pixels; the
//!    clipped median is the background level and the clipped standard
//!    deviation scales the significance map `z = (pixel - median) / std`.
//! 2. Pixels with `z > merge_thr` form 8-connected components.
//! 3. Seed peaks are local maxima of `z` above `seed_thr`, brightest first.
//! 4. A component survives if its maximum significance reaches `seed_thr`,
//!    its outer contour encloses a polygon, and a seed peak lies strictly
//!    inside that polygon. An optional distance cut removes sources whose
//!    peak is far from the image centre.
//! 5. Among survivors the one whose peak is closest to the image centre is
//!    kept, and its minimum enclosing circle and flux are measured.

use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2};

use shared::image_proc::contour::first_outer_contour;
use shared::image_proc::enclosing_circle::{min_enclosing_circle, EnclosingCircle};
use shared::image_proc::peaks::{find_local_peaks, PeakOptions};
use shared::image_proc::thresholding::{
    apply_threshold, connected_components, label_regions, valid_pixel_mask, BoundingBox,
};
use shared::stats::{sigma_clipped_stats, DEFAULT_CLIP_ITERATIONS};

use crate::config::DetectionOptions;

/// Footprint of the seed peak search
const SEED_PEAK_FOOTPRINT: usize = 3;

/// The dominant compact source of one channel
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSource {
    /// Seed peak as (row, col)
    pub peak: (usize, usize),
    /// Pixels of the selected component
    pub mask: Array2<bool>,
    /// Tight bounding box of the component
    pub bbox: BoundingBox,
    /// Number of pixels in the mask
    pub npix: usize,
    /// Minimum enclosing circle of the component contour
    pub enclosing_circle: Option<EnclosingCircle>,
    /// Integrated flux, background subtracted when configured
    pub flux: f64,
}

/// Detection outcome for one channel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelDetection {
    /// Clipped median of valid pixels, if any were available
    pub bkg_level: Option<f64>,
    /// Selected source, if one survived
    pub source: Option<DetectedSource>,
}

impl ChannelDetection {
    /// Mask of the detected source, if any
    pub fn mask(&self) -> Option<&Array2<bool>> {
        self.source.as_ref().map(|s| &s.mask)
    }

    /// Peak of the detected source, if any
    pub fn peak(&self) -> Option<(usize, usize)> {
        self.source.as_ref().map(|s| s.peak)
    }

    /// Enclosing circle of the detected source, if any
    pub fn circle(&self) -> Option<EnclosingCircle> {
        self.source.as_ref().and_then(|s| s.enclosing_circle)
    }
}

/// Candidate that passed every per-component cut
struct Candidate {
    peak: (usize, usize),
    mask: Array2<bool>,
    bbox: BoundingBox,
    npix: usize,
    contour_xy: Vec<(f64, f64)>,
}

/// Significance-threshold source finder
#[derive(Debug, Clone)]
pub struct SourceDetector {
    options: DetectionOptions,
}

impl SourceDetector {
    pub fn new(options: DetectionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    /// Detect the dominant source of a single channel
    ///
    /// # Arguments
    /// * `channel` - Channel image; zero or non-finite pixels are masked
    ///
    /// # Returns
    /// Background level and the selected source, either of which may be absent
    pub fn detect(&self, channel: ArrayView2<f64>) -> ChannelDetection {
        let opts = &self.options;
        let (rows, cols) = channel.dim();

        let valid = valid_pixel_mask(channel);
        let values: Vec<f64> = channel
            .iter()
            .zip(valid.iter())
            .filter(|(_, &ok)| ok)
            .map(|(&v, _)| v)
            .collect();

        let stats = match sigma_clipped_stats(&values, opts.sigma_clip, DEFAULT_CLIP_ITERATIONS) {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Cannot compute background statistics: {e}");
                return ChannelDetection::default();
            }
        };
        debug!(
            "Clipped stats: mean={}, median={}, std={} ({} kept)",
            stats.mean, stats.median, stats.std_dev, stats.n_kept
        );

        let bkg_level = Some(stats.median);
        let no_source = ChannelDetection {
            bkg_level,
            source: None,
        };

        if !(stats.std_dev.is_finite() && stats.std_dev > 0.0) {
            warn!("Background spread is {}, no source can be found", stats.std_dev);
            return no_source;
        }

        let zmap = channel.mapv(|v| (v - stats.median) / stats.std_dev);

        let binary = apply_threshold(zmap.view(), opts.merge_thr, Some(valid.view()));
        let (labels, num_labels) = connected_components(binary.view());
        let regions = label_regions(labels.view(), num_labels);
        info!("{} components above merge threshold", regions.len());

        let peak_options = PeakOptions {
            footprint: SEED_PEAK_FOOTPRINT,
            min_distance: opts.min_peak_distance,
            threshold_abs: Some(opts.seed_thr),
            exclude_border: true,
        };
        let peaks = find_local_peaks(zmap.view(), &peak_options);
        if peaks.is_empty() {
            info!("No seed peaks above {}", opts.seed_thr);
            return no_source;
        }

        let x_c = cols as f64 / 2.0;
        let y_c = rows as f64 / 2.0;
        let center_dist =
            |p: (usize, usize)| ((p.1 as f64 - x_c).powi(2) + (p.0 as f64 - y_c).powi(2)).sqrt();

        let mut candidates: Vec<Candidate> = Vec::new();
        for region in &regions {
            let zmax = region.max_value(zmap.view());
            if zmax < opts.seed_thr {
                debug!("Skip component {}: zmax={zmax} < {}", region.label, opts.seed_thr);
                continue;
            }

            let mask = region.mask((rows, cols));
            let Some(contour) = first_outer_contour(mask.view()) else {
                continue;
            };
            let Some(polygon) = contour.to_polygon() else {
                debug!("Skip component {}: contour has no polygon", region.label);
                continue;
            };

            let Some(&peak) = peaks
                .iter()
                .find(|&&(r, c)| region.bbox.contains(r, c) && polygon.contains(c as f64, r as f64))
            else {
                debug!("Skip component {}: no peak inside contour", region.label);
                continue;
            };

            if opts.dist_thr > 0.0 {
                let dist = center_dist(peak);
                if dist > opts.dist_thr {
                    debug!(
                        "Skip component {}: peak distance {dist} > {}",
                        region.label, opts.dist_thr
                    );
                    continue;
                }
            }

            candidates.push(Candidate {
                peak,
                npix: region.area(),
                bbox: region.bbox,
                contour_xy: contour.xy(),
                mask,
            });
        }

        if candidates.is_empty() {
            info!("No component selected");
            return no_source;
        }

        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, cand) in candidates.iter().enumerate() {
            let dist = center_dist(cand.peak);
            if dist < best_dist {
                best_dist = dist;
                best = idx;
            }
        }
        if candidates.len() > 1 {
            info!(
                "{} components selected, keeping #{best} closest to the image centre",
                candidates.len()
            );
        }
        let chosen = candidates.swap_remove(best);

        let enclosing_circle = min_enclosing_circle(&chosen.contour_xy);
        if enclosing_circle.is_none() {
            warn!("Failed to compute the enclosing circle of the selected source");
        }

        let total: f64 = channel
            .iter()
            .zip(chosen.mask.iter())
            .filter(|(v, &m)| m && v.is_finite())
            .map(|(&v, _)| v)
            .sum();
        let flux = if opts.subtract_bkg {
            total - stats.median * chosen.npix as f64
        } else {
            total
        };

        ChannelDetection {
            bkg_level,
            source: Some(DetectedSource {
                peak: chosen.peak,
                mask: chosen.mask,
                bbox: chosen.bbox,
                npix: chosen.npix,
                enclosing_circle,
                flux,
            }),
        }
    }
}
