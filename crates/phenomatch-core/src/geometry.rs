//! Point primitives over face-mesh landmark coordinates.

use serde::{Deserialize, Serialize};

/// Number of points in a complete face-mesh landmark set.
pub const LANDMARK_COUNT: usize = 468;

/// One face-mesh keypoint in normalized image space.
///
/// `x` and `y` are in [0, 1]; `z` is relative depth and is treated as 0
/// when the producer omits it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// 3-D Euclidean distance between landmarks `i` and `j`.
///
/// Callers are responsible for bounds; the analyzer only calls this after
/// checking the set holds [`LANDMARK_COUNT`] points.
pub fn distance(landmarks: &[Landmark], i: usize, j: usize) -> f64 {
    let (a, b) = (landmarks[i], landmarks[j]);
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

/// Planar midpoint of landmarks `i` and `j` (depth is dropped).
pub fn midpoint(landmarks: &[Landmark], i: usize, j: usize) -> (f64, f64) {
    let (a, b) = (landmarks[i], landmarks[j]);
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}
