//! Batched ray-AABB intersection, 3D-DDA traversal, and grid accumulation.

mod dda;
mod grid;

pub use dda::{ray_aabb_intersect, raycast_batch, trace_ray_scalar, MAX_RAY_STEPS};
pub use grid::{GridError, VoxelGrid};

use camera_geometry::RayBatch;

/// Owns the [`VoxelGrid`] and exposes the tick-facing raycast/accumulate
/// operations. The pipeline orchestrator holds exactly one of these.
#[derive(Debug, Clone)]
pub struct VoxelTracer {
    grid: VoxelGrid,
}

impl VoxelTracer {
    pub fn new(
        bottom_left_latlon: (f64, f64),
        top_right_latlon: (f64, f64),
        height_m: f64,
        resolution: [usize; 3],
    ) -> Result<Self, GridError> {
        Ok(Self {
            grid: VoxelGrid::new(bottom_left_latlon, top_right_latlon, height_m, resolution)?,
        })
    }

    pub fn set_grid_size(
        &mut self,
        bottom_left_latlon: (f64, f64),
        top_right_latlon: (f64, f64),
        height_m: f64,
    ) -> Result<(), GridError> {
        self.grid.set_grid_size(bottom_left_latlon, top_right_latlon, height_m)
    }

    pub fn set_grid_size_keep_resolution(
        &mut self,
        bottom_left_latlon: (f64, f64),
        top_right_latlon: (f64, f64),
        height_m: f64,
    ) -> Result<(), GridError> {
        self.grid
            .set_grid_size_keep_resolution(bottom_left_latlon, top_right_latlon, height_m)
    }

    pub fn set_grid_resolution(&mut self, resolution: [usize; 3]) -> Result<(), GridError> {
        self.grid.set_grid_resolution(resolution)
    }

    pub fn add_grid_data(&mut self, voxels: &[[usize; 3]], weights: &[u64]) {
        self.grid.add_grid_data(voxels, weights);
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Ray-AABB + 3D-DDA for an entire camera's ray batch, returned as a
    /// concatenated `(indices, weights)` pair ready for [`VoxelGrid::add_grid_data`].
    pub fn raycast_batch(&self, rays: &RayBatch) -> (Vec<[usize; 3]>, Vec<u64>) {
        raycast_batch(rays, &self.grid)
    }
}
