//! Cross-channel geometry of detected sources
//!
//! For every unordered channel pair the overlap of the detection masks, the
//! distance between the seed peaks and the separation of the enclosing
//! circles are measured. Pairs are enumerated in row-major upper-triangle
//! order, `(0,1), (0,2), …, (1,2), …`.

use std::fmt;

use itertools::Itertools;
use ndarray::{ArrayView2, Zip};

use crate::detection::ChannelDetection;

/// Ordered pair of channel indices with `i < j`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairIndex {
    pub i: usize,
    pub j: usize,
}

impl PairIndex {
    /// Feature-name suffix with 1-based channel numbers, e.g. `ch1_2`
    pub fn suffix(&self) -> String {
        format!("ch{}_{}", self.i + 1, self.j + 1)
    }
}

impl fmt::Display for PairIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

/// All pairs `i < j` of `n` channels in upper-triangle order
pub fn channel_pairs(n: usize) -> Vec<PairIndex> {
    (0..n)
        .tuple_combinations()
        .map(|(i, j)| PairIndex { i, j })
        .collect()
}

/// Geometry of one channel pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairGeometry {
    pub pair: PairIndex,
    /// Intersection over union of the two masks, 0 if either is missing
    pub iou: f64,
    /// Euclidean peak distance, 0 if either peak is missing
    pub peak_distance: f64,
    /// Circle centre distance over the sum of radii, -1 if not measurable
    pub separation: f64,
}

/// Intersection over union of two equally shaped masks
///
/// Returns 0 when the union is empty.
pub fn mask_iou(a: ArrayView2<bool>, b: ArrayView2<bool>) -> f64 {
    let mut inter = 0usize;
    let mut union = 0usize;
    Zip::from(a).and(b).for_each(|&x, &y| {
        if x && y {
            inter += 1;
        }
        if x || y {
            union += 1;
        }
    });
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

fn pair_geometry(pair: PairIndex, a: &ChannelDetection, b: &ChannelDetection) -> PairGeometry {
    let iou = match (a.mask(), b.mask()) {
        (Some(ma), Some(mb)) => mask_iou(ma.view(), mb.view()),
        _ => 0.0,
    };

    let peak_distance = match (a.peak(), b.peak()) {
        (Some(pa), Some(pb)) => {
            let dr = pa.0 as f64 - pb.0 as f64;
            let dc = pa.1 as f64 - pb.1 as f64;
            (dr * dr + dc * dc).sqrt()
        }
        _ => 0.0,
    };

    let separation = match (a.circle(), b.circle()) {
        (Some(ca), Some(cb)) if ca.radius > 0.0 && cb.radius > 0.0 => {
            ca.center_distance(&cb) / (ca.radius + cb.radius)
        }
        _ => -1.0,
    };

    PairGeometry {
        pair,
        iou,
        peak_distance,
        separation,
    }
}

/// Pairwise geometry for all channel pairs
pub fn compute_geometry(detections: &[ChannelDetection]) -> Vec<PairGeometry> {
    channel_pairs(detections.len())
        .into_iter()
        .map(|pair| pair_geometry(pair, &detections[pair.i], &detections[pair.j]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectedSource;
    use ndarray::Array2;
    use shared::image_proc::enclosing_circle::EnclosingCircle;
    use shared::image_proc::thresholding::BoundingBox;

    fn square(size: usize, r0: usize, c0: usize, side: usize) -> Array2<bool> {
        Array2::from_shape_fn((size, size), |(r, c)| {
            r >= r0 && r < r0 + side && c >= c0 && c < c0 + side
        })
    }

    fn detection(mask: Array2<bool>, peak: (usize, usize), circle: EnclosingCircle) -> ChannelDetection {
        let npix = mask.iter().filter(|&&m| m).count();
        ChannelDetection {
            bkg_level: Some(0.0),
            source: Some(DetectedSource {
                peak,
                mask,
                bbox: BoundingBox::new(0, 0, 1, 1),
                npix,
                enclosing_circle: Some(circle),
                flux: 1.0,
            }),
        }
    }

    #[test]
    fn test_channel_pairs_order() {
        let pairs: Vec<(usize, usize)> = channel_pairs(4).iter().map(|p| (p.i, p.j)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert!(channel_pairs(1).is_empty());
        assert_eq!(channel_pairs(3)[2].suffix(), "ch2_3");
    }

    #[test]
    fn test_mask_iou() {
        let a = square(10, 0, 0, 4);
        let b = square(10, 2, 0, 4);
        // 8 shared of 24 total
        assert_eq!(mask_iou(a.view(), b.view()), 8.0 / 24.0);
        assert_eq!(mask_iou(a.view(), a.view()), 1.0);

        let empty = Array2::from_elem((10, 10), false);
        assert_eq!(mask_iou(empty.view(), empty.view()), 0.0);
    }

    #[test]
    fn test_pair_geometry() {
        let c1 = EnclosingCircle { x: 5.0, y: 5.0, radius: 2.0 };
        let c2 = EnclosingCircle { x: 8.0, y: 9.0, radius: 3.0 };
        let dets = vec![
            detection(square(12, 3, 3, 4), (5, 5), c1),
            detection(square(12, 3, 3, 4), (9, 8), c2),
        ];
        let geom = compute_geometry(&dets);
        assert_eq!(geom.len(), 1);
        assert_eq!(geom[0].iou, 1.0);
        assert_eq!(geom[0].peak_distance, 5.0);
        assert_eq!(geom[0].separation, 1.0);
    }

    #[test]
    fn test_missing_detection_defaults() {
        let c = EnclosingCircle { x: 5.0, y: 5.0, radius: 2.0 };
        let dets = vec![
            detection(square(12, 3, 3, 4), (5, 5), c),
            ChannelDetection::default(),
        ];
        let geom = compute_geometry(&dets);
        assert_eq!(geom[0].iou, 0.0);
        assert_eq!(geom[0].peak_distance, 0.0);
        assert_eq!(geom[0].separation, -1.0);
    }

    #[test]
    fn test_zero_radius_separation() {
        let c = EnclosingCircle { x: 5.0, y: 5.0, radius: 0.0 };
        let dets = vec![
            detection(square(12, 5, 5, 1), (5, 5), c),
            detection(square(12, 5, 5, 1), (5, 5), c),
        ];
        assert_eq!(compute_geometry(&dets)[0].separation, -1.0);
    }
}
