//! Extraction configuration
//!
//! [`ExtractorConfig`] groups every tunable of the pipeline by stage. It is
//! (de)serializable to JSON, every field has a default, and a partially
//! specified file only overrides the fields it names. The configuration is
//! validated once before any image is processed and never mutated afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared::image_proc::moments::NUM_CENTRAL_MOMENTS;

/// Errors raised while loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Image sanity checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Require the cube to follow a normalization convention
    pub normalize_img: bool,
    /// With `normalize_img`, only require `max == 1` (otherwise `[0, 1]`)
    pub scale_to_max: bool,
    /// Maximum tolerated fraction of zero pixels inside the reference region
    pub fthr_zeros: f64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            normalize_img: false,
            scale_to_max: false,
            fthr_zeros: 0.1,
        }
    }
}

/// Per-channel source finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOptions {
    /// Significance a component must reach to seed a source
    pub seed_thr: f64,
    /// Significance above which pixels join a component
    pub merge_thr: f64,
    /// Clipping threshold for the background statistics
    pub sigma_clip: f64,
    /// Subtract the background level from the source flux
    pub subtract_bkg: bool,
    /// Maximum peak distance from the image centre; disabled when not positive
    pub dist_thr: f64,
    /// Minimum separation between seed peaks in pixels
    pub min_peak_distance: usize,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            seed_thr: 5.0,
            merge_thr: 3.0,
            sigma_clip: 3.0,
            subtract_bkg: true,
            dist_thr: -1.0,
            min_peak_distance: 2,
        }
    }
}

/// Which point of the reference detection serves as the moment centroid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorCentroid {
    /// Centre of the minimum enclosing circle
    CircleCenter,
    /// Seed peak of the detection
    Peak,
}

/// Choice of the shared moment anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorOptions {
    /// Use the reference channel's detection mask and circle
    pub use_sfind_mask: bool,
    /// Grow the detection mask once with an elliptical kernel
    pub dilate_mask: bool,
    /// Side of the elliptical dilation kernel
    pub kernsize: usize,
    /// Maximum distance between the raw centroid and a peak replacing it
    pub cm_peak_thr: f64,
    /// Centroid taken from the detection
    pub centroid: AnchorCentroid,
}

impl Default for AnchorOptions {
    fn default() -> Self {
        Self {
            use_sfind_mask: true,
            dilate_mask: false,
            kernsize: 5,
            cm_peak_thr: 5.0,
            centroid: AnchorCentroid::CircleCenter,
        }
    }
}

/// Structural similarity maps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsimOptions {
    /// Compute SSIM maps even if their parameters are not saved
    pub compute: bool,
    /// Side of the uniform SSIM window
    pub winsize: usize,
}

impl Default for SsimOptions {
    fn default() -> Self {
        Self {
            compute: false,
            winsize: 3,
        }
    }
}

/// Colour-index maps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorIndexOptions {
    /// Compute colour-index maps even if their parameters are not saved
    pub compute: bool,
    /// Per-channel offsets subtracted before taking logarithms; empty means zeros
    pub chan_mins: Vec<f64>,
    /// Keep only pixels whose SSIM exceeds this value
    pub ssim_thr: Option<f64>,
    /// Value written to invalid colour-index pixels
    pub colorind_safe: f64,
    /// Absolute colour index beyond which a pixel is an outlier
    pub colorind_thr: f64,
    /// Weight the shifted colour index by the SSIM map
    pub weight_colmap_with_ssim: bool,
}

impl Default for ColorIndexOptions {
    fn default() -> Self {
        Self {
            compute: false,
            chan_mins: Vec::new(),
            ssim_thr: None,
            colorind_safe: 0.0,
            colorind_thr: 6.0,
            weight_colmap_with_ssim: false,
        }
    }
}

/// Which optional feature groups are emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub save_mom_pars: bool,
    /// Number of leading central moments saved per channel
    pub save_mom_max_no: usize,
    pub save_hu_mom_pars: bool,
    pub save_zern_mom_pars: bool,
    pub save_ssim_pars: bool,
    pub save_cind_pars: bool,
    /// Colour written when either flux is unusable
    pub color_safe: f64,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            save_mom_pars: false,
            save_mom_max_no: 1,
            save_hu_mom_pars: false,
            save_zern_mom_pars: false,
            save_ssim_pars: false,
            save_cind_pars: false,
            color_safe: 0.0,
        }
    }
}

/// Complete configuration of the feature extractor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Reference channel index
    pub refch: usize,
    pub validation: ValidationOptions,
    pub detection: DetectionOptions,
    pub anchor: AnchorOptions,
    pub ssim: SsimOptions,
    pub color_index: ColorIndexOptions,
    pub output: OutputOptions,
    /// Stop the batch after this many images
    pub max_images: Option<usize>,
}

impl ExtractorConfig {
    /// Whether SSIM maps are needed by this configuration
    pub fn ssim_enabled(&self) -> bool {
        self.ssim.compute || self.output.save_ssim_pars
    }

    /// Whether colour-index maps are needed by this configuration
    pub fn color_index_enabled(&self) -> bool {
        self.color_index.compute || self.output.save_cind_pars
    }

    /// Check the channel-independent constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(msg: String) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg))
        }

        if self.output.save_mom_max_no > NUM_CENTRAL_MOMENTS {
            return invalid(format!(
                "save_mom_max_no must be at most {NUM_CENTRAL_MOMENTS}, got {}",
                self.output.save_mom_max_no
            ));
        }
        if self.ssim.winsize < 3 || self.ssim.winsize % 2 == 0 {
            return invalid(format!(
                "ssim winsize must be odd and at least 3, got {}",
                self.ssim.winsize
            ));
        }
        if self.anchor.kernsize == 0 {
            return invalid("anchor kernsize must be positive".to_string());
        }
        if !(self.validation.fthr_zeros.is_finite() && self.validation.fthr_zeros >= 0.0) {
            return invalid(format!(
                "fthr_zeros must be a non-negative number, got {}",
                self.validation.fthr_zeros
            ));
        }
        if !(self.detection.sigma_clip.is_finite() && self.detection.sigma_clip > 0.0) {
            return invalid(format!(
                "sigma_clip must be positive, got {}",
                self.detection.sigma_clip
            ));
        }
        if !(self.color_index.colorind_thr.is_finite() && self.color_index.colorind_thr > 0.0) {
            return invalid(format!(
                "colorind_thr must be positive, got {}",
                self.color_index.colorind_thr
            ));
        }
        Ok(())
    }

    /// Check the constraints that depend on the number of channels
    pub fn validate_for_channels(&self, nchannels: usize) -> Result<(), ConfigError> {
        if self.refch >= nchannels {
            return Err(ConfigError::Invalid(format!(
                "refch {} out of range for {nchannels} channels",
                self.refch
            )));
        }
        let nmins = self.color_index.chan_mins.len();
        if nmins != 0 && nmins != nchannels {
            return Err(ConfigError::Invalid(format!(
                "chan_mins has {nmins} entries for {nchannels} channels"
            )));
        }
        Ok(())
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file and validate
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
