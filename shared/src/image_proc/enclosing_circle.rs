//! Minimum enclosing circle of a point set
//!
//! Incremental construction: whenever a point falls outside the current
//! circle it must lie on the boundary of the next one, which is rebuilt from
//! that point and the points seen before it. Points are processed in input
//! order, so the result is deterministic.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

/// Circle in image coordinates, x = column and y = row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnclosingCircle {
    /// Centre column
    pub x: f64,
    /// Centre row
    pub y: f64,
    /// Radius in pixels
    pub radius: f64,
}

impl EnclosingCircle {
    /// Euclidean distance between two circle centres
    pub fn center_distance(&self, other: &EnclosingCircle) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Centre as a (row, col) centroid
    pub fn center_row_col(&self) -> (f64, f64) {
        (self.y, self.x)
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        let d = ((p.0 - self.x).powi(2) + (p.1 - self.y).powi(2)).sqrt();
        d <= self.radius + EPS * self.radius.max(1.0)
    }

    fn from_point(p: (f64, f64)) -> Self {
        Self {
            x: p.0,
            y: p.1,
            radius: 0.0,
        }
    }

    fn from_diameter(a: (f64, f64), b: (f64, f64)) -> Self {
        let x = 0.5 * (a.0 + b.0);
        let y = 0.5 * (a.1 + b.1);
        let radius = 0.5 * ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
        Self { x, y, radius }
    }

    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < EPS {
            // Collinear: the widest pair spans the circle
            let candidates = [
                Self::from_diameter(a, b),
                Self::from_diameter(a, c),
                Self::from_diameter(b, c),
            ];
            return candidates
                .into_iter()
                .fold(Self::from_point(a), |best, c| {
                    if c.radius > best.radius {
                        c
                    } else {
                        best
                    }
                });
        }

        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let x = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let y = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        let radius = ((a.0 - x).powi(2) + (a.1 - y).powi(2)).sqrt();
        Self { x, y, radius }
    }
}

/// Smallest circle containing every (x, y) point; `None` for an empty set
pub fn min_enclosing_circle(points: &[(f64, f64)]) -> Option<EnclosingCircle> {
    let first = *points.first()?;
    let mut circle = EnclosingCircle::from_point(first);

    for i in 1..points.len() {
        if circle.contains(points[i]) {
            continue;
        }
        circle = EnclosingCircle::from_point(points[i]);
        for j in 0..i {
            if circle.contains(points[j]) {
                continue;
            }
            circle = EnclosingCircle::from_diameter(points[i], points[j]);
            for k in 0..j {
                if !circle.contains(points[k]) {
                    circle = EnclosingCircle::from_three(points[i], points[j], points[k]);
                }
            }
        }
    }

    Some(circle)
}
