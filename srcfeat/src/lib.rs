//! Feature extraction for multi-channel astronomical source cutouts
//!
//! A cube of co-registered channels centred on one source goes through
//! validation, per-channel source detection, cross-channel geometry, shape
//! moments about a shared anchor, pairwise SSIM and colour-index maps, and
//! is finally flattened into an ordered [`FeatureRecord`].
//!
//! ```no_run
//! use srcfeat::{ExtractorConfig, FeatureExtractorHelper, ImageCube, SourceInfo};
//! use shared::image_proc::test_patterns::gaussian_cube;
//!
//! let helper = FeatureExtractorHelper::new(ExtractorConfig::default())?;
//! let cube = ImageCube::new(gaussian_cube(64, 5.0, 100.0, &[1.0, 0.5, 0.2]))?;
//! let record = helper.extract(&cube, &SourceInfo::default())?;
//! println!("{}", record.to_row(" "));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod color_index;
pub mod config;
pub mod cube;
pub mod detection;
pub mod features;
pub mod geometry;
pub mod moments;
pub mod pipeline;
pub mod similarity;
pub mod validate;

pub use config::{ConfigError, ExtractorConfig};
pub use cube::{ClassId, CubeError, ImageCube, SourceInfo};
pub use features::{FeatureRecord, FeatureSchema, FeatureValue};
pub use pipeline::{
    ExtractionError, ExtractionResult, FeatureExtractor, FeatureExtractorHelper, FeatureTable,
};
