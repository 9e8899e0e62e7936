//! Per-image and batch feature extraction
//!
//! [`FeatureExtractorHelper`] runs every stage on a single cube and returns
//! its feature record. [`FeatureExtractor`] drives the helper over a stream
//! of cubes, skipping images that fail and collecting the rest into a
//! [`FeatureTable`].

use std::io::{self, Write};

use log::{debug, info, warn};
use thiserror::Error;

use crate::color_index::{compute_color_index, PairColorIndex};
use crate::config::{ConfigError, ExtractorConfig};
use crate::cube::{ImageCube, SourceInfo};
use crate::detection::{ChannelDetection, SourceDetector};
use crate::features::{assemble, FeatureRecord, FeatureSchema};
use crate::geometry::{compute_geometry, PairGeometry};
use crate::moments::{
    compute_channel_moments, select_anchor, MomentComputer, MomentError, MomentSet,
    ReferenceAnchor,
};
use crate::similarity::{compute_similarity, PairSimilarity};
use crate::validate::{validate_cube, ValidationError};

/// Reasons an image produces no feature record
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("No source detected in reference channel {0}")]
    NoReferenceSource(usize),
    #[error("Reference source in channel {0} has no enclosing circle")]
    NoReferenceCircle(usize),
    #[error("Failed to determine the moment anchor: {0}")]
    NoAnchor(MomentError),
    #[error("Failed to compute moments of channel {channel}: {source}")]
    Moments {
        channel: usize,
        source: MomentError,
    },
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Every intermediate product of one extraction
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub info: SourceInfo,
    pub refch: usize,
    pub detections: Vec<ChannelDetection>,
    /// Per-channel flux, with the reference-aperture fallback applied
    pub fluxes: Vec<f64>,
    /// `log10(F_ref / F_k)` per channel; the reference entry is 0
    pub colors: Vec<f64>,
    pub geometry: Vec<PairGeometry>,
    pub anchor: ReferenceAnchor,
    pub moments: Vec<MomentSet>,
    pub similarity: Option<Vec<PairSimilarity>>,
    pub color_index: Option<Vec<PairColorIndex>>,
}

/// Colour from two fluxes, `safe` unless both are positive and finite
pub fn flux_color(flux_ref: f64, flux: f64, safe: f64) -> f64 {
    let good = |f: f64| f.is_finite() && f > 0.0;
    if good(flux_ref) && good(flux) {
        (flux_ref / flux).log10()
    } else {
        safe
    }
}

/// Feature extraction for a single cube
#[derive(Debug, Clone)]
pub struct FeatureExtractorHelper {
    config: ExtractorConfig,
    detector: SourceDetector,
    computer: MomentComputer,
}

impl FeatureExtractorHelper {
    /// Create a helper, rejecting an invalid configuration
    pub fn new(config: ExtractorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            detector: SourceDetector::new(config.detection.clone()),
            computer: MomentComputer::new(config.anchor.cm_peak_thr),
            config,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Schema of the records produced for cubes with `nchannels` channels
    pub fn schema(&self, nchannels: usize) -> FeatureSchema {
        FeatureSchema::new(nchannels, self.config.refch, &self.config.output)
    }

    /// Fluxes per channel; undetected channels fall back to the sum inside
    /// the reference mask
    fn channel_fluxes(&self, cube: &ImageCube, detections: &[ChannelDetection]) -> Vec<f64> {
        let refch = self.config.refch;
        let ref_mask = detections.get(refch).and_then(|d| d.mask());

        detections
            .iter()
            .zip(cube.channels())
            .enumerate()
            .map(|(k, (det, channel))| {
                if let Some(source) = &det.source {
                    return source.flux;
                }
                let Some(mask) = ref_mask else {
                    return 0.0;
                };
                let (sum, npix) = channel
                    .iter()
                    .zip(mask.iter())
                    .filter(|(_, &m)| m)
                    .fold((0.0, 0usize), |(s, n), (&v, _)| {
                        (if v.is_finite() { s + v } else { s }, n + 1)
                    });
                let flux = if self.config.detection.subtract_bkg {
                    sum - det.bkg_level.unwrap_or(0.0) * npix as f64
                } else {
                    sum
                };
                info!("No source in channel {k}, using reference aperture flux {flux}");
                flux
            })
            .collect()
    }

    /// Run every stage and keep the intermediate products
    pub fn process(
        &self,
        cube: &ImageCube,
        info: &SourceInfo,
    ) -> Result<ExtractionResult, ExtractionError> {
        let config = &self.config;
        let refch = config.refch;
        config.validate_for_channels(cube.nchannels())?;

        validate_cube(cube, refch, &config.validation)?;

        info!("Extracting sources for image {} (label={}) ...", info.sname, info.label);
        let detections: Vec<ChannelDetection> =
            cube.channels().map(|ch| self.detector.detect(ch)).collect();
        let reference = detections[refch]
            .source
            .as_ref()
            .ok_or(ExtractionError::NoReferenceSource(refch))?;
        if reference.enclosing_circle.is_none() {
            return Err(ExtractionError::NoReferenceCircle(refch));
        }

        let fluxes = self.channel_fluxes(cube, &detections);
        let flux_ref = fluxes[refch];
        if !(flux_ref.is_finite() && flux_ref > 0.0) {
            warn!(
                "Reference flux {flux_ref} is unusable for image {}, colours set to {}",
                info.sname, config.output.color_safe
            );
        }
        let colors = fluxes
            .iter()
            .enumerate()
            .map(|(k, &f)| {
                if k == refch {
                    0.0
                } else {
                    flux_color(flux_ref, f, config.output.color_safe)
                }
            })
            .collect();

        let geometry = compute_geometry(&detections);

        info!("Computing image moments for image {} ...", info.sname);
        let anchor = select_anchor(cube, refch, &detections, &config.anchor, &self.computer)
            .map_err(ExtractionError::NoAnchor)?;
        let moments = compute_channel_moments(cube, &anchor, &self.computer)
            .map_err(|(channel, source)| ExtractionError::Moments { channel, source })?;

        let similarity = if config.ssim_enabled() {
            info!("Computing SSIM parameters for image {} ...", info.sname);
            Some(compute_similarity(cube, &anchor, &self.computer, config.ssim.winsize))
        } else {
            None
        };

        let color_index = if config.color_index_enabled() {
            info!("Computing colour index parameters for image {} ...", info.sname);
            Some(compute_color_index(
                cube,
                &anchor,
                &self.computer,
                similarity.as_deref(),
                &config.color_index,
            )?)
        } else {
            None
        };

        Ok(ExtractionResult {
            info: info.clone(),
            refch,
            detections,
            fluxes,
            colors,
            geometry,
            anchor,
            moments,
            similarity,
            color_index,
        })
    }

    /// Extract the feature record of one cube
    pub fn extract(
        &self,
        cube: &ImageCube,
        info: &SourceInfo,
    ) -> Result<FeatureRecord, ExtractionError> {
        let result = self.process(cube, info)?;
        let record = assemble(&self.schema(cube.nchannels()), &result);
        debug!("Image {}: {} features", info.sname, record.len());
        Ok(record)
    }
}

/// Feature records of a batch with their shared header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    pub header: Vec<String>,
    pub rows: Vec<FeatureRecord>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write a `# `-prefixed header line followed by one line per record
    pub fn write_to<W: Write>(&self, mut writer: W, delimiter: &str) -> io::Result<()> {
        writeln!(writer, "# {}", self.header.join(delimiter))?;
        for row in &self.rows {
            writeln!(writer, "{}", row.to_row(delimiter))?;
        }
        writer.flush()
    }
}

/// Batch driver over a stream of cubes
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    helper: FeatureExtractorHelper,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            helper: FeatureExtractorHelper::new(config)?,
        })
    }

    pub fn helper(&self) -> &FeatureExtractorHelper {
        &self.helper
    }

    /// Extract features from every item, stopping after `max_images`
    ///
    /// Images that fail are logged and skipped, as are records whose columns
    /// differ from the first one.
    pub fn run<I>(&self, items: I) -> FeatureTable
    where
        I: IntoIterator<Item = (ImageCube, SourceInfo)>,
    {
        let limit = self.helper.config().max_images.unwrap_or(usize::MAX);
        let mut table = FeatureTable::default();
        let mut processed = 0usize;

        for (idx, (cube, info)) in items.into_iter().take(limit).enumerate() {
            processed += 1;
            let record = match self.helper.extract(&cube, &info) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping image {idx} ({}): {e}", info.sname);
                    continue;
                }
            };

            if table.header.is_empty() {
                table.header = record.names().map(str::to_string).collect();
            } else if !record.names().eq(table.header.iter().map(String::as_str)) {
                warn!("Skipping image {idx} ({}): columns differ from the header", info.sname);
                continue;
            }
            table.rows.push(record);
        }

        info!("Extracted features for {} of {processed} images", table.len());
        table
    }
}
