//! Image processing primitives for source feature extraction
//!
//! This module provides the single-channel building blocks used by the
//! extraction pipeline: segmentation, peak finding, contour tracing,
//! enclosing circles, morphology, image moments and structural similarity,
//! plus seeded noise and synthetic patterns for testing.

pub mod contour;
pub mod enclosing_circle;
pub mod moments;
pub mod morphology;
pub mod noise;
pub mod peaks;
pub mod ssim;
pub mod test_patterns;
pub mod thresholding;

// Re-export key functionality for easier access
pub use contour::{first_outer_contour, Contour, Polygon};
pub use enclosing_circle::{min_enclosing_circle, EnclosingCircle};
pub use moments::{central_moments, hu_moments, normalized_moments, zernike_moments, RawMoments};
pub use morphology::{dilate, elliptical_kernel};
pub use peaks::{find_local_peaks, PeakOptions};
pub use ssim::{ssim_map, SsimParams};
pub use thresholding::{
    apply_threshold, connected_components, label_regions, valid_pixel_mask, BoundingBox, Region,
};
