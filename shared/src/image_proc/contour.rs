//! Outer contour extraction for binary masks
//!
//! Contours are traced with 8-connected Moore neighbour following, starting
//! from the first set pixel in raster order, so only the external boundary of
//! the first connected component is produced. Straight horizontal, vertical and
//! diagonal runs are compressed to their end points, and a compressed contour
//! with at least three vertices can be turned into a [`Polygon`] for
//! point-containment tests.

use ndarray::ArrayView2;

/// Clockwise neighbour ring (row, col) with rows growing downwards
const RING: [(isize, isize); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Index of the west neighbour in [`RING`]
const WEST: usize = 4;

fn ring_index(dr: isize, dc: isize) -> usize {
    RING.iter()
        .position(|&d| d == (dr, dc))
        .unwrap_or(WEST)
}

/// Closed outer boundary of one connected component
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Boundary vertices as (row, col) pixel centres
    pub points: Vec<(usize, usize)>,
}

impl Contour {
    /// Number of vertices
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the contour has no vertices
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Vertices as (x, y) = (col, row) floating point coordinates
    pub fn xy(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|&(r, c)| (c as f64, r as f64))
            .collect()
    }

    /// Build a polygon; fails for fewer than three vertices
    pub fn to_polygon(&self) -> Option<Polygon> {
        if self.points.len() < 3 {
            return None;
        }
        Some(Polygon {
            vertices: self.xy(),
        })
    }
}

/// Simple closed polygon in (x, y) coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<(f64, f64)>,
}

fn on_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    if cross.abs() > 1e-12 {
        return false;
    }
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

impl Polygon {
    /// Polygon vertices
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// Strict interior test: points on the boundary are not contained
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        let p = (x, y);

        for i in 0..n {
            if on_segment(p, self.vertices[i], self.vertices[(i + 1) % n]) {
                return false;
            }
        }

        // Even-odd ray casting towards +x
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > y) != (yj > y) {
                let x_cross = xi + (y - yi) * (xj - xi) / (yj - yi);
                if x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Trace the outer boundary of the component containing `start`.
///
/// `start` must be the first pixel of its component in raster order so that
/// its west neighbour is guaranteed to be background.
pub fn trace_boundary(mask: ArrayView2<bool>, start: (usize, usize)) -> Vec<(usize, usize)> {
    let (rows, cols) = mask.dim();
    let is_set = |r: isize, c: isize| -> bool {
        r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols && mask[[r as usize, c as usize]]
    };

    let start_i = (start.0 as isize, start.1 as isize);
    let mut boundary = vec![start];
    let mut current = start_i;
    let mut backtrack_dir = WEST;
    let mut first_move: Option<(isize, isize)> = None;

    let max_steps = 8 * rows * cols + 16;
    for _ in 0..max_steps {
        let mut next: Option<((isize, isize), usize)> = None;
        for k in 1..=8 {
            let d = (backtrack_dir + k) % 8;
            let cand = (current.0 + RING[d].0, current.1 + RING[d].1);
            if is_set(cand.0, cand.1) {
                next = Some((cand, d));
                break;
            }
        }

        let Some((cand, d)) = next else {
            // Isolated pixel
            break;
        };

        match first_move {
            None => first_move = Some(cand),
            Some(first) if current == start_i && cand == first => break,
            Some(_) => {}
        }

        let prev_dir = (d + 7) % 8;
        let back = (current.0 + RING[prev_dir].0, current.1 + RING[prev_dir].1);
        backtrack_dir = ring_index(back.0 - cand.0, back.1 - cand.1);
        current = cand;

        if current == start_i {
            continue;
        }
        boundary.push((current.0 as usize, current.1 as usize));
    }

    boundary
}

/// Drop vertices lying inside straight runs of a closed chain
pub fn compress_chain(points: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |a: (usize, usize), b: (usize, usize)| -> (isize, isize) {
        (
            (b.0 as isize - a.0 as isize).signum(),
            (b.1 as isize - a.1 as isize).signum(),
        )
    };

    points
        .iter()
        .enumerate()
        .filter(|&(i, &p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, p) != step(p, next)
        })
        .map(|(_, &p)| p)
        .collect()
}

/// Outer contour of the first component of the mask
///
/// Neighbour following never leaves the 8-connected component of its start
/// pixel, so other components of the mask are ignored.
pub fn first_outer_contour(mask: ArrayView2<bool>) -> Option<Contour> {
    let start = mask.indexed_iter().find(|(_, &v)| v).map(|(idx, _)| idx)?;
    let raw = trace_boundary(mask, start);
    Some(Contour {
        points: compress_chain(&raw),
    })
}
