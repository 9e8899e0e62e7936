//! Input cube sanity checks
//!
//! A cube is rejected before any measurement when it contains non-finite
//! pixels, breaks the requested normalization convention, has too many zero
//! pixels inside the reference footprint, or has a channel with a single
//! repeated value. Checks run in that order and the first failure is
//! reported.

use log::{debug, warn};
use thiserror::Error;

use crate::config::ValidationOptions;
use crate::cube::ImageCube;

/// Reason a cube failed validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Cube contains non-finite pixels")]
    NonFinitePixels,
    #[error("Cube has invalid normalization (min={min}, max={max})")]
    InvalidNormalization { min: f64, max: f64 },
    #[error("Channel {channel} has zero fraction {fraction} >= {threshold}")]
    ZeroFraction {
        channel: usize,
        fraction: f64,
        threshold: f64,
    },
    #[error("Channel {channel} has all pixels equal to {value}")]
    ConstantChannel { channel: usize, value: f64 },
}

/// Validate a cube against `opts`, using `refch` to define the source footprint
///
/// # Arguments
/// * `cube` - Image cube to check
/// * `refch` - Reference channel whose valid pixels define the footprint
/// * `opts` - Validation thresholds
///
/// # Returns
/// `Ok(())` when every check passes, otherwise the first failed check
pub fn validate_cube(
    cube: &ImageCube,
    refch: usize,
    opts: &ValidationOptions,
) -> Result<(), ValidationError> {
    let data = cube.data();
    if data.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinitePixels);
    }

    if opts.normalize_img {
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let correct = if opts.scale_to_max {
            max == 1.0
        } else {
            min == 0.0 && max == 1.0
        };
        if !correct {
            return Err(ValidationError::InvalidNormalization { min, max });
        }
    }

    let reference = cube.channel(refch);
    let footprint: Vec<(usize, usize)> = reference
        .indexed_iter()
        .filter(|(_, &v)| v != 0.0 && v.is_finite())
        .map(|(idx, _)| idx)
        .collect();

    for (channel, image) in cube.channels().enumerate() {
        let n = footprint.len();
        let n_zeros = footprint.iter().filter(|&&idx| image[idx] == 0.0).count();
        let fraction = if n == 0 {
            1.0
        } else {
            n_zeros as f64 / n as f64
        };
        if n_zeros > 0 {
            debug!("Channel {channel}: n={n}, n_zeros={n_zeros}, f={fraction}");
        }
        if fraction >= opts.fthr_zeros {
            warn!(
                "Channel {channel} has zero fraction {fraction} >= {}",
                opts.fthr_zeros
            );
            return Err(ValidationError::ZeroFraction {
                channel,
                fraction,
                threshold: opts.fthr_zeros,
            });
        }

        let first = image[[0, 0]];
        if image.iter().all(|&v| v == first) {
            warn!("Channel {channel} has all pixels equal to {first}");
            return Err(ValidationError::ConstantChannel {
                channel,
                value: first,
            });
        }
    }

    Ok(())
}

/// Boolean form of [`validate_cube`]
pub fn validate(cube: &ImageCube, refch: usize, opts: &ValidationOptions) -> bool {
    validate_cube(cube, refch, opts).is_ok()
}
