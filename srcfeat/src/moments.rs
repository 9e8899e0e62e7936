//! Shape moments of channel images and derived maps
//!
//! [`MomentComputer`] produces a [`MomentSet`] (16 central moments up to
//! order 3, Hu's seven invariants and nine Zernike magnitudes) for one image.
//! All channels of a cube, and every SSIM and colour-index map, are measured
//! about one shared [`ReferenceAnchor`] taken from the reference channel so
//! that their moments are directly comparable.

use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

use shared::image_proc::contour::first_outer_contour;
use shared::image_proc::enclosing_circle::min_enclosing_circle;
use shared::image_proc::moments::{
    central_moments, hu_moments, normalized_moments, zernike_moments, RawMoments, MOMENT_ORDER,
    NUM_CENTRAL_MOMENTS, NUM_HU_MOMENTS, NUM_ZERNIKE_MOMENTS,
};
use shared::image_proc::morphology::{dilate, elliptical_kernel};
use shared::image_proc::peaks::{find_local_peaks, PeakOptions};
use shared::image_proc::thresholding::valid_pixel_mask;

use crate::config::{AnchorCentroid, AnchorOptions};
use crate::cube::ImageCube;
use crate::detection::ChannelDetection;

/// Placeholder written for quantities that could not be measured
pub const SENTINEL: f64 = -999.0;

/// Footprint of the peak search that refines the raw centroid
const CENTROID_PEAK_FOOTPRINT: usize = 5;

/// Minimum separation of the peaks refining the raw centroid
const CENTROID_PEAK_DISTANCE: usize = 2;

/// Errors computing moments
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MomentError {
    #[error("Image has no valid pixels to derive a mask from")]
    EmptyMask,
    #[error("Image centroid is undefined (zero total intensity)")]
    UndefinedCentroid,
}

/// A measurement that may have failed and been replaced by a sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum Measured<T> {
    Value(T),
    Sentinel,
}

impl<T> Measured<T> {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Measured::Sentinel)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Measured::Value(v) => Some(v),
            Measured::Sentinel => None,
        }
    }
}

impl<const N: usize> Measured<[f64; N]> {
    /// Values, or `N` sentinels
    pub fn to_array(&self) -> [f64; N] {
        match self {
            Measured::Value(v) => *v,
            Measured::Sentinel => [SENTINEL; N],
        }
    }
}

/// Moments of one image about a fixed centroid
#[derive(Debug, Clone, PartialEq)]
pub struct MomentSet {
    /// Central moments `mu[p][q]`, `p, q ∈ 0..=3`, flattened row-major
    pub central: Vec<f64>,
    /// Hu's seven invariants
    pub hu: [f64; NUM_HU_MOMENTS],
    /// Zernike magnitudes, degree 4
    pub zernike: Measured<[f64; NUM_ZERNIKE_MOMENTS]>,
}

impl MomentSet {
    /// Set with every entry equal to the sentinel
    pub fn sentinel() -> Self {
        Self {
            central: vec![SENTINEL; NUM_CENTRAL_MOMENTS],
            hu: [SENTINEL; NUM_HU_MOMENTS],
            zernike: Measured::Sentinel,
        }
    }

    /// Zernike magnitudes with sentinels filled in
    pub fn zernike_values(&self) -> [f64; NUM_ZERNIKE_MOMENTS] {
        self.zernike.to_array()
    }

    /// Single value of the given family, sentinel when out of range
    pub fn get(&self, kind: MomentKind, index: usize) -> f64 {
        let value = match kind {
            MomentKind::Central => self.central.get(index).copied(),
            MomentKind::Hu => self.hu.get(index).copied(),
            MomentKind::Zernike => self.zernike_values().get(index).copied(),
        };
        value.unwrap_or(SENTINEL)
    }
}

/// Moment family within a [`MomentSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentKind {
    Central,
    Hu,
    Zernike,
}

impl MomentKind {
    /// Feature-name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            MomentKind::Central => "mom",
            MomentKind::Hu => "humom",
            MomentKind::Zernike => "zernmom",
        }
    }
}

/// Output of [`MomentComputer::compute`]
#[derive(Debug, Clone, PartialEq)]
pub struct MomentResult {
    pub moments: MomentSet,
    /// Mask used to derive the radius
    pub mask: Array2<bool>,
    /// Centroid (row, col) the moments are taken about
    pub centroid: (f64, f64),
    /// Zernike disk radius, if one could be derived
    pub radius: Option<f64>,
}

/// Mask, centroid and radius shared by every moment computation of a cube
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAnchor {
    pub mask: Array2<bool>,
    /// (row, col)
    pub centroid: (f64, f64),
    pub radius: Option<f64>,
}

/// Computes central, Hu and Zernike moments of an image
#[derive(Debug, Clone)]
pub struct MomentComputer {
    cm_peak_thr: f64,
}

impl Default for MomentComputer {
    fn default() -> Self {
        Self { cm_peak_thr: 5.0 }
    }
}

impl MomentComputer {
    /// # Arguments
    /// * `cm_peak_thr` - Maximum distance at which a local peak replaces the raw centroid
    pub fn new(cm_peak_thr: f64) -> Self {
        Self { cm_peak_thr }
    }

    /// Best centroid estimate: the raw intensity centroid, replaced by the
    /// nearest local peak within `cm_peak_thr` pixels.
    pub fn best_centroid(&self, image: ArrayView2<f64>) -> Result<(f64, f64), MomentError> {
        let raw = RawMoments::calculate(image).centroid();
        if !(raw.0.is_finite() && raw.1.is_finite()) {
            return Err(MomentError::UndefinedCentroid);
        }

        let options = PeakOptions {
            footprint: CENTROID_PEAK_FOOTPRINT,
            min_distance: CENTROID_PEAK_DISTANCE,
            threshold_abs: None,
            exclude_border: true,
        };

        let mut best: Option<(f64, f64)> = None;
        let mut best_dist = f64::INFINITY;
        for (r, c) in find_local_peaks(image, &options) {
            let p = (r as f64, c as f64);
            let d = ((p.0 - raw.0).powi(2) + (p.1 - raw.1).powi(2)).sqrt();
            if d < best_dist && d <= self.cm_peak_thr {
                best_dist = d;
                best = Some(p);
            }
        }

        Ok(best.unwrap_or(raw))
    }

    /// Compute the moments of `image`
    ///
    /// # Arguments
    /// * `image` - Image to measure; non-finite pixels count as zero
    /// * `mask` - Source mask; derived from non-zero finite pixels when absent
    /// * `centroid` - Centroid (row, col); estimated when absent
    /// * `radius` - Zernike radius; derived from the mask's enclosing circle when absent
    ///
    /// # Returns
    /// The moments together with the mask, centroid and radius actually used
    pub fn compute(
        &self,
        image: ArrayView2<f64>,
        mask: Option<ArrayView2<bool>>,
        centroid: Option<(f64, f64)>,
        radius: Option<f64>,
    ) -> Result<MomentResult, MomentError> {
        let clean = image.mapv(|v| if v.is_finite() { v } else { 0.0 });

        let mask = match mask {
            Some(m) => m.to_owned(),
            None => {
                let derived = valid_pixel_mask(image);
                if !derived.iter().any(|&m| m) {
                    return Err(MomentError::EmptyMask);
                }
                derived
            }
        };

        let centroid = match centroid {
            Some(c) => c,
            None => self.best_centroid(clean.view())?,
        };

        let mu = central_moments(clean.view(), centroid, MOMENT_ORDER);
        let nu = normalized_moments(mu.view());
        let hu = hu_moments(nu.view());
        let central: Vec<f64> = mu.iter().copied().collect();

        let radius = radius.or_else(|| {
            let contour = first_outer_contour(mask.view())?;
            min_enclosing_circle(&contour.xy()).map(|c| c.radius)
        });

        let zernike = match radius {
            Some(r) => match zernike_moments(clean.view(), r, centroid) {
                Ok(z) => Measured::Value(z),
                Err(e) => {
                    warn!("Failed to compute Zernike moments: {e}");
                    Measured::Sentinel
                }
            },
            None => {
                warn!("No radius available, Zernike moments set to {SENTINEL}");
                Measured::Sentinel
            }
        };

        Ok(MomentResult {
            moments: MomentSet {
                central,
                hu,
                zernike,
            },
            mask,
            centroid,
            radius,
        })
    }

    /// Moments of a derived map about the anchor, sentinel on failure
    pub fn map_moments(&self, map: ArrayView2<f64>, anchor: &ReferenceAnchor) -> MomentSet {
        match self.compute(map, Some(anchor.mask.view()), Some(anchor.centroid), None) {
            Ok(result) => result.moments,
            Err(e) => {
                warn!("Failed to compute map moments: {e}");
                MomentSet::sentinel()
            }
        }
    }
}

/// Dilate the anchor mask and re-derive its enclosing circle
fn dilated_anchor(mask: &Array2<bool>, kernsize: usize) -> Option<(Array2<bool>, (f64, f64), f64)> {
    let kernel = elliptical_kernel(kernsize);
    let dilated = dilate(mask.view(), kernel.view());
    let contour = first_outer_contour(dilated.view())?;
    let circle = min_enclosing_circle(&contour.xy())?;
    Some((dilated, circle.center_row_col(), circle.radius))
}

/// Choose the anchor shared by all moment computations of a cube
///
/// With `use_sfind_mask` the reference channel's detection mask and enclosing
/// circle are used (optionally dilated); otherwise, or when the detection is
/// unavailable, the reference channel's own moment computation supplies
/// the mask, centroid and radius.
pub fn select_anchor(
    cube: &ImageCube,
    refch: usize,
    detections: &[ChannelDetection],
    opts: &AnchorOptions,
    computer: &MomentComputer,
) -> Result<ReferenceAnchor, MomentError> {
    if opts.use_sfind_mask {
        let reference = detections.get(refch).and_then(|d| d.source.as_ref());
        match reference.and_then(|s| s.enclosing_circle.map(|c| (s, c))) {
            Some((source, circle)) => {
                let centroid = match opts.centroid {
                    AnchorCentroid::CircleCenter => circle.center_row_col(),
                    AnchorCentroid::Peak => (source.peak.0 as f64, source.peak.1 as f64),
                };
                let mut anchor = ReferenceAnchor {
                    mask: source.mask.clone(),
                    centroid,
                    radius: Some(circle.radius),
                };
                info!(
                    "Anchor from detection: centroid=({:.3},{:.3}), radius={:.3}",
                    centroid.0, centroid.1, circle.radius
                );

                if opts.dilate_mask {
                    match dilated_anchor(&anchor.mask, opts.kernsize) {
                        Some((mask, center, radius)) => {
                            if opts.centroid == AnchorCentroid::CircleCenter {
                                anchor.centroid = center;
                            }
                            anchor.mask = mask;
                            anchor.radius = Some(radius);
                            info!(
                                "Dilated anchor: centroid=({:.3},{:.3}), radius={radius:.3}",
                                anchor.centroid.0, anchor.centroid.1
                            );
                        }
                        None => warn!("Failed to dilate the anchor mask, using the original one"),
                    }
                }
                return Ok(anchor);
            }
            None => warn!("Reference detection unavailable, deriving anchor from moments"),
        }
    }

    let result = computer.compute(cube.channel(refch), None, None, None)?;
    debug!(
        "Anchor from moments: centroid=({:.3},{:.3}), radius={:?}",
        result.centroid.0, result.centroid.1, result.radius
    );
    Ok(ReferenceAnchor {
        mask: result.mask,
        centroid: result.centroid,
        radius: result.radius,
    })
}

/// Sum of the non-zero finite pixels of an image
pub fn valid_pixel_sum(image: ArrayView2<f64>) -> f64 {
    image
        .iter()
        .filter(|v| **v != 0.0 && v.is_finite())
        .sum()
}

/// Moments of every channel about the anchor
///
/// The zeroth central moment of each set is replaced by the sum of the
/// channel's valid pixels.
///
/// # Returns
/// One set per channel, or the failing channel index with its error
pub fn compute_channel_moments(
    cube: &ImageCube,
    anchor: &ReferenceAnchor,
    computer: &MomentComputer,
) -> Result<Vec<MomentSet>, (usize, MomentError)> {
    cube.channels()
        .enumerate()
        .map(|(k, channel)| {
            let result = computer
                .compute(
                    channel,
                    Some(anchor.mask.view()),
                    Some(anchor.centroid),
                    anchor.radius,
                )
                .map_err(|e| (k, e))?;
            let mut moments = result.moments;
            moments.central[0] = valid_pixel_sum(channel);
            Ok(moments)
        })
        .collect()
}
