use nalgebra::Vector3;
use ndarray::Array3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid_max must be strictly greater than grid_min on every axis")]
    NonPositiveExtent,
    #[error("resolution must be at least 1 on every axis")]
    ZeroResolution,
}

/// Axis-aligned accumulator grid in mixed lat/lon/alt units: axes 0 and 1 are
/// degrees of latitude/longitude, axis 2 is meters of altitude.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    grid_min: Vector3<f64>,
    grid_max: Vector3<f64>,
    resolution: [usize; 3],
    voxel_size: Vector3<f64>,
    cells: Array3<u64>,
}

fn validate(grid_min: Vector3<f64>, grid_max: Vector3<f64>, resolution: [usize; 3]) -> Result<(), GridError> {
    if resolution.iter().any(|&r| r < 1) {
        return Err(GridError::ZeroResolution);
    }
    if (0..3).any(|a| grid_max[a] <= grid_min[a]) {
        return Err(GridError::NonPositiveExtent);
    }
    Ok(())
}

fn voxel_size_for(grid_min: Vector3<f64>, grid_max: Vector3<f64>, resolution: [usize; 3]) -> Vector3<f64> {
    Vector3::new(
        (grid_max.x - grid_min.x) / resolution[0] as f64,
        (grid_max.y - grid_min.y) / resolution[1] as f64,
        (grid_max.z - grid_min.z) / resolution[2] as f64,
    )
}

impl VoxelGrid {
    pub fn new(
        bottom_left_latlon: (f64, f64),
        top_right_latlon: (f64, f64),
        height_m: f64,
        resolution: [usize; 3],
    ) -> Result<Self, GridError> {
        let grid_min = Vector3::new(bottom_left_latlon.0, bottom_left_latlon.1, 0.0);
        let grid_max = Vector3::new(top_right_latlon.0, top_right_latlon.1, height_m);
        validate(grid_min, grid_max, resolution)?;
        let voxel_size = voxel_size_for(grid_min, grid_max, resolution);
        let cells = Array3::zeros((resolution[0], resolution[1], resolution[2]));
        Ok(Self {
            grid_min,
            grid_max,
            resolution,
            voxel_size,
            cells,
        })
    }

    /// Rebind bounds, keep the current resolution, clear cells.
    pub fn set_grid_size(
        &mut self,
        bottom_left_latlon: (f64, f64),
        top_right_latlon: (f64, f64),
        height_m: f64,
    ) -> Result<(), GridError> {
        let grid_min = Vector3::new(bottom_left_latlon.0, bottom_left_latlon.1, 0.0);
        let grid_max = Vector3::new(top_right_latlon.0, top_right_latlon.1, height_m);
        validate(grid_min, grid_max, self.resolution)?;
        self.grid_min = grid_min;
        self.grid_max = grid_max;
        self.voxel_size = voxel_size_for(grid_min, grid_max, self.resolution);
        self.clear();
        Ok(())
    }

    /// Rebind bounds, rounding resolution to keep the current voxel size as
    /// close as possible, clear cells.
    pub fn set_grid_size_keep_resolution(
        &mut self,
        bottom_left_latlon: (f64, f64),
        top_right_latlon: (f64, f64),
        height_m: f64,
    ) -> Result<(), GridError> {
        let grid_min = Vector3::new(bottom_left_latlon.0, bottom_left_latlon.1, 0.0);
        let grid_max = Vector3::new(top_right_latlon.0, top_right_latlon.1, height_m);
        if (0..3).any(|a| grid_max[a] <= grid_min[a]) {
            return Err(GridError::NonPositiveExtent);
        }
        let extent = grid_max - grid_min;
        let resolution = [
            ((extent.x / self.voxel_size.x).round().max(1.0)) as usize,
            ((extent.y / self.voxel_size.y).round().max(1.0)) as usize,
            ((extent.z / self.voxel_size.z).round().max(1.0)) as usize,
        ];
        validate(grid_min, grid_max, resolution)?;
        self.grid_min = grid_min;
        self.grid_max = grid_max;
        self.resolution = resolution;
        self.voxel_size = voxel_size_for(grid_min, grid_max, resolution);
        self.cells = Array3::zeros((resolution[0], resolution[1], resolution[2]));
        Ok(())
    }

    /// Rebind resolution, rescale voxel size, clear cells.
    pub fn set_grid_resolution(&mut self, resolution: [usize; 3]) -> Result<(), GridError> {
        validate(self.grid_min, self.grid_max, resolution)?;
        self.resolution = resolution;
        self.voxel_size = voxel_size_for(self.grid_min, self.grid_max, resolution);
        self.cells = Array3::zeros((resolution[0], resolution[1], resolution[2]));
        Ok(())
    }

    pub fn add_grid_data(&mut self, voxels: &[[usize; 3]], weights: &[u64]) {
        debug_assert_eq!(voxels.len(), weights.len());
        for (v, w) in voxels.iter().zip(weights) {
            self.cells[[v[0], v[1], v[2]]] += w;
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    pub fn grid_min(&self) -> Vector3<f64> {
        self.grid_min
    }

    pub fn grid_max(&self) -> Vector3<f64> {
        self.grid_max
    }

    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    pub fn voxel_size(&self) -> Vector3<f64> {
        self.voxel_size
    }

    pub fn cells(&self) -> &Array3<u64> {
        &self.cells
    }

    /// The largest axis voxel edge, used as the representative edge length
    /// for the clustering `eps` even though the axes carry mixed units.
    pub fn max_voxel_edge(&self) -> f64 {
        self.voxel_size.x.max(self.voxel_size.y).max(self.voxel_size.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_non_positive_extent() {
        let err = VoxelGrid::new((1.0, 1.0), (1.0, 1.0), 10.0, [1, 1, 1]).unwrap_err();
        assert!(matches!(err, GridError::NonPositiveExtent));
    }

    #[test]
    fn new_rejects_zero_resolution() {
        let err = VoxelGrid::new((0.0, 0.0), (1.0, 1.0), 10.0, [0, 1, 1]).unwrap_err();
        assert!(matches!(err, GridError::ZeroResolution));
    }

    #[test]
    fn reconfiguration_clears_cells() {
        let mut grid = VoxelGrid::new((0.0, 0.0), (10.0, 10.0), 10.0, [10, 10, 10]).unwrap();
        grid.add_grid_data(&[[1, 1, 1]], &[5]);
        assert_eq!(grid.cells().sum(), 5);

        grid.set_grid_resolution([5, 5, 5]).unwrap();
        assert_eq!(grid.cells().sum(), 0);
        assert_eq!(grid.cells().shape(), &[5, 5, 5]);
    }

    #[test]
    fn accumulation_is_idempotent_after_clear() {
        let mut grid = VoxelGrid::new((0.0, 0.0), (10.0, 10.0), 10.0, [10, 10, 10]).unwrap();
        grid.add_grid_data(&[[0, 0, 0], [1, 1, 1]], &[3, 4]);
        grid.clear();
        assert_eq!(grid.cells().sum(), 0);
    }
}
