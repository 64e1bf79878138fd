//! Pose-to-camera-geometry conversion and per-pixel ray construction.
//!
//! Mirrors the pinhole-viewport derivation used throughout the multi-camera
//! fusion literature: a virtual image plane one focal length in front of the
//! camera, expressed in world axes, rotated only at ray-direction time.

use aloft_types::{MotionMask, RawSensorRecord};
use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraGeometryError {
    #[error("failed to read motion mask: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode motion mask image: {0}")]
    Image(#[from] image::ImageError),
}

/// Derived, immutable per-tick camera state.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    pub cam_id: u32,
    pub timestamp: f64,
    pub rotation_rad: Vector3<f64>,
    pub position: Vector3<f64>,
    pub fov_deg: f64,
    pub pixel_delta_u: Vector3<f64>,
    pub pixel_delta_v: Vector3<f64>,
    pub pixel00_world: Vector3<f64>,
    pub width: usize,
    pub height: usize,
}

impl CameraState {
    /// Build camera state from a raw record plus already-known mask
    /// dimensions. Pure and infallible; used by [`process`] and directly by
    /// callers (tests, in-memory batchers) that don't want a filesystem hit.
    pub fn from_raw_with_dims(raw: &RawSensorRecord, width: usize, height: usize) -> Self {
        let position = raw.position_vec();
        let rotation_rad = raw.rotation_deg_vec().map(f64::to_radians);
        let fov_rad = raw.fov_deg.to_radians();

        let focal_length = (width as f64 / 2.0) / (fov_rad / 2.0).tan();
        let h = (fov_rad / 2.0).tan();
        let viewport_height = h * focal_length;
        let viewport_width = viewport_height * width as f64 / height as f64;

        let u = Vector3::new(viewport_width, 0.0, 0.0);
        let v = Vector3::new(0.0, -viewport_height, 0.0);

        let pixel_delta_u = u / width as f64;
        let pixel_delta_v = v / height as f64;

        let pixel00_world = position
            - Vector3::new(0.0, 0.0, focal_length)
            - u / 2.0
            - v / 2.0
            + 0.5 * (pixel_delta_u + pixel_delta_v);

        Self {
            cam_id: raw.cam_id,
            timestamp: raw.timestamp,
            rotation_rad,
            position,
            fov_deg: raw.fov_deg,
            pixel_delta_u,
            pixel_delta_v,
            pixel00_world,
            width,
            height,
        }
    }

    /// The `Rz * Ry * Rx` rotation matrix for this camera's current pose.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        rotation_matrix(self.rotation_rad)
    }
}

/// Elementary XYZ-intrinsic rotation matrix, `R = Rz * Ry * Rx`.
///
/// Axis order is load-bearing: transposing the product or swapping axis
/// order silently corrupts triangulation (see design notes).
pub fn rotation_matrix(rotation_rad: Vector3<f64>) -> Matrix3<f64> {
    let (rx, ry, rz) = (rotation_rad.x, rotation_rad.y, rotation_rad.z);

    let r_x = Matrix3::new(
        1.0,
        0.0,
        0.0,
        0.0,
        rx.cos(),
        -rx.sin(),
        0.0,
        rx.sin(),
        rx.cos(),
    );
    let r_y = Matrix3::new(
        ry.cos(),
        0.0,
        ry.sin(),
        0.0,
        1.0,
        0.0,
        -ry.sin(),
        0.0,
        ry.cos(),
    );
    let r_z = Matrix3::new(
        rz.cos(),
        -rz.sin(),
        0.0,
        rz.sin(),
        rz.cos(),
        0.0,
        0.0,
        0.0,
        1.0,
    );

    r_z * r_y * r_x
}

/// Load the mask to obtain its dimensions, then build [`CameraState`].
///
/// If the mask cannot be read, the error is returned rather than raised
/// globally: callers (the pipeline orchestrator) skip this camera for the
/// tick and log, per the camera-isolation failure policy.
pub fn process(raw: &RawSensorRecord) -> Result<CameraState, CameraGeometryError> {
    let img = image::open(&raw.mask_path)?;
    Ok(CameraState::from_raw_with_dims(
        raw,
        img.width() as usize,
        img.height() as usize,
    ))
}

/// Decode the grayscale mask image at `path` into a [`MotionMask`].
pub fn load_mask(path: &str) -> Result<MotionMask, CameraGeometryError> {
    let img = image::open(path)?.into_luma8();
    let (width, height) = (img.width() as usize, img.height() as usize);
    Ok(MotionMask::from_pixels(width, height, img.into_raw()))
}

/// A single back-projected ray: origin at the camera, direction *not*
/// renormalized (used as a velocity in `origin + t * dir`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f64>,
    pub dir: Vector3<f64>,
    pub weight: u64,
}

/// Parallel-array batch of rays from one camera's motion mask.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RayBatch {
    pub origins: Vec<Vector3<f64>>,
    pub dirs: Vec<Vector3<f64>>,
    pub weights: Vec<u64>,
}

impl RayBatch {
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn ray(&self, i: usize) -> Ray {
        Ray {
            origin: self.origins[i],
            dir: self.dirs[i],
            weight: self.weights[i],
        }
    }
}

/// Back-projects every motion pixel in `mask` into a world-space ray from
/// `cam`. Returns `None` if the mask has no motion at all.
pub fn build(cam: &CameraState, mask: &MotionMask) -> Option<RayBatch> {
    let r_t = cam.rotation_matrix();

    let mut batch = RayBatch::default();
    for (x, y, value) in mask.motion_pixels() {
        let pixel_center =
            cam.pixel00_world + x as f64 * cam.pixel_delta_u + y as f64 * cam.pixel_delta_v;
        let raw_dir = pixel_center - cam.position;
        let world_dir = r_t * raw_dir;

        batch.origins.push(cam.position);
        batch.dirs.push(world_dir);
        batch.weights.push(value as u64);
    }

    if batch.is_empty() {
        None
    } else {
        Some(batch)
    }
}
