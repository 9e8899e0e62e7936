//! Shared image processing and statistics primitives for multi-channel
//! source feature extraction.

pub mod image_proc;
pub mod stats;
