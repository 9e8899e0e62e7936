//! Multi-channel image cubes and their source metadata
//!
//! An [`ImageCube`] holds co-registered channels of a single source-centred
//! cutout in `(row, col, channel)` order. Masked pixels are stored as zero or
//! as non-finite values. The pipeline never mutates a cube.

use std::fmt;

use ndarray::{Array3, Array4, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors constructing a cube
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CubeError {
    #[error("Cube has no pixels or no channels (shape {0:?})")]
    Empty((usize, usize, usize)),
    #[error("Batch wrapper must hold exactly one image, got {0}")]
    BatchSize(usize),
    #[error("Ragged pixel data at row {row}, col {col}")]
    Ragged { row: usize, col: usize },
}

/// Co-registered channels of one cutout
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCube {
    data: Array3<f64>,
}

impl ImageCube {
    /// Wrap a `(height, width, nchannels)` array
    pub fn new(data: Array3<f64>) -> Result<Self, CubeError> {
        let (h, w, c) = data.dim();
        if h == 0 || w == 0 || c == 0 {
            return Err(CubeError::Empty((h, w, c)));
        }
        Ok(Self { data })
    }

    /// Unwrap a `(1, height, width, nchannels)` batch of one image
    pub fn from_batch(batch: Array4<f64>) -> Result<Self, CubeError> {
        let n = batch.len_of(Axis(0));
        if n != 1 {
            return Err(CubeError::BatchSize(n));
        }
        Self::new(batch.index_axis_move(Axis(0), 0))
    }

    /// Build from nested `[row][col][channel]` vectors
    pub fn from_nested(rows: &[Vec<Vec<f64>>]) -> Result<Self, CubeError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let nch = rows
            .first()
            .and_then(|r| r.first())
            .map_or(0, |px| px.len());

        let mut flat = Vec::with_capacity(height * width * nch);
        for (row, cols) in rows.iter().enumerate() {
            if cols.len() != width {
                return Err(CubeError::Ragged { row, col: cols.len() });
            }
            for (col, px) in cols.iter().enumerate() {
                if px.len() != nch {
                    return Err(CubeError::Ragged { row, col });
                }
                flat.extend_from_slice(px);
            }
        }

        let data = Array3::from_shape_vec((height, width, nch), flat)
            .map_err(|_| CubeError::Empty((height, width, nch)))?;
        Self::new(data)
    }

    /// Image height in pixels
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    /// Image width in pixels
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    /// Number of channels
    pub fn nchannels(&self) -> usize {
        self.data.dim().2
    }

    /// View of channel `k`
    pub fn channel(&self, k: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(2), k)
    }

    /// Iterate over all channels in order
    pub fn channels(&self) -> impl Iterator<Item = ArrayView2<'_, f64>> {
        self.data.axis_iter(Axis(2))
    }

    /// Underlying `(row, col, channel)` array
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }
}

/// Class identifier of a source, either a single id or a multi-label list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassId {
    Single(i64),
    Multi(Vec<i64>),
}

impl Default for ClassId {
    fn default() -> Self {
        ClassId::Single(0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassId::Single(id) => write!(f, "{id}"),
            ClassId::Multi(ids) => {
                let parts: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

/// Metadata passed through unchanged into the feature record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Source name
    pub sname: String,
    /// Human-readable label
    #[serde(default)]
    pub label: String,
    /// Class identifier
    #[serde(default)]
    pub classid: ClassId,
}

impl SourceInfo {
    pub fn new(sname: impl Into<String>, label: impl Into<String>, classid: ClassId) -> Self {
        Self {
            sname: sname.into(),
            label: label.into(),
            classid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty() {
        let data = Array3::<f64>::zeros((4, 4, 0));
        assert_eq!(ImageCube::new(data), Err(CubeError::Empty((4, 4, 0))));
    }

    #[test]
    fn test_from_batch() {
        let batch = Array4::from_shape_fn((1, 3, 4, 2), |(_, r, c, k)| (r * 100 + c * 10 + k) as f64);
        let cube = ImageCube::from_batch(batch).unwrap();
        assert_eq!((cube.height(), cube.width(), cube.nchannels()), (3, 4, 2));
        assert_eq!(cube.channel(1)[[2, 3]], 231.0);

        let batch = Array4::<f64>::zeros((2, 3, 4, 2));
        assert_eq!(ImageCube::from_batch(batch), Err(CubeError::BatchSize(2)));
    }

    #[test]
    fn test_from_nested() {
        let rows = vec![
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![vec![5.0, 6.0], vec![7.0, 8.0]],
        ];
        let cube = ImageCube::from_nested(&rows).unwrap();
        assert_eq!(cube.nchannels(), 2);
        assert_eq!(cube.channel(0)[[1, 0]], 5.0);
        assert_eq!(cube.channel(1)[[0, 1]], 4.0);
        assert_eq!(cube.channels().count(), 2);
    }

    #[test]
    fn test_from_nested_ragged() {
        let rows = vec![vec![vec![1.0, 2.0], vec![3.0]]];
        assert_eq!(
            ImageCube::from_nested(&rows),
            Err(CubeError::Ragged { row: 0, col: 1 })
        );
    }

    #[test]
    fn test_classid_serde() {
        let single: ClassId = serde_json::from_str("3").unwrap();
        let multi: ClassId = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(single, ClassId::Single(3));
        assert_eq!(multi, ClassId::Multi(vec![1, 2]));
        assert_eq!(multi.to_string(), "[1,2]");
    }

    #[test]
    fn test_source_info_defaults() {
        let info: SourceInfo = serde_json::from_str(r#"{ "sname": "S1" }"#).unwrap();
        assert_eq!(info.sname, "S1");
        assert_eq!(info.classid, ClassId::Single(0));
    }
}
