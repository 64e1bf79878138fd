//! Shared wire/data types passed between pipeline stages and I/O adapters.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One camera's published observation for a tick, as handed off by the
/// (out-of-scope) edge extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSensorRecord {
    pub cam_id: u32,
    pub timestamp: f64,
    /// Euler XYZ rotation in degrees: (roll, pitch, yaw).
    pub rotation_deg: [f64; 3],
    /// (latitude, longitude, altitude_m).
    pub position: [f64; 3],
    pub mask_path: String,
    pub fov_deg: f64,
}

impl RawSensorRecord {
    pub fn position_vec(&self) -> Vector3<f64> {
        Vector3::new(self.position[0], self.position[1], self.position[2])
    }

    pub fn rotation_deg_vec(&self) -> Vector3<f64> {
        Vector3::new(
            self.rotation_deg[0],
            self.rotation_deg[1],
            self.rotation_deg[2],
        )
    }
}

/// Rectangular grid of motion-mask magnitudes; non-zero pixels mark motion.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionMask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl MotionMask {
    pub fn from_pixels(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "motion mask buffer length must equal width * height"
        );
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Value at pixel (x, y); 0 means no motion.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Iterate `(x, y, value)` over every non-zero pixel, row-major.
    pub fn motion_pixels(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        let width = self.width;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(move |(idx, &v)| (idx % width, idx / width, v))
    }
}

/// Emitted tracked-object result for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: u32,
    pub timestamp: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}
