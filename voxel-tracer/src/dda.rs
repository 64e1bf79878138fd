//! Ray-AABB intersection and Amanatides & Woo 3D-DDA traversal.
//!
//! The batch entry point and the scalar reference entry point share a single
//! per-ray stepping routine, so the batched kernel's output is, by
//! construction, the ordered concatenation of the scalar kernel's output.

use camera_geometry::RayBatch;
use nalgebra::Vector3;

use crate::grid::VoxelGrid;

pub const MAX_RAY_STEPS: usize = 512;

/// Ray-AABB slab test. Returns the entry parameter `tmin` if the ray
/// intersects the box ahead of or behind its origin (negative `tmin` means
/// the origin is inside the box). `f64::min`/`f64::max` ignore a NaN operand
/// (IEEE `minNum`/`maxNum` semantics), which is exactly the "NaN-ignoring
/// aggregation" the batched slab test needs: a ray exactly parallel to an
/// axis produces a `0 * inf` NaN on that axis, and should still be accepted
/// if its origin lies within that axis's slab.
pub fn ray_aabb_intersect(
    origin: Vector3<f64>,
    dir: Vector3<f64>,
    grid_min: Vector3<f64>,
    grid_max: Vector3<f64>,
) -> Option<f64> {
    let inv = Vector3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
    let t1 = (grid_min - origin).component_mul(&inv);
    let t2 = (grid_max - origin).component_mul(&inv);

    let lo = Vector3::new(t1.x.min(t2.x), t1.y.min(t2.y), t1.z.min(t2.z));
    let hi = Vector3::new(t1.x.max(t2.x), t1.y.max(t2.y), t1.z.max(t2.z));

    let tmin = lo.x.max(lo.y).max(lo.z);
    let tmax = hi.x.min(hi.y).min(hi.z);

    if tmax > tmin.max(0.0) {
        Some(tmin)
    } else {
        None
    }
}

fn sign(x: f64) -> i64 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Axis with the smallest `tMax`, ties broken toward axis 0, then 1.
fn argmin_axis(t_max: [f64; 3]) -> usize {
    let mut best = 0;
    for axis in 1..3 {
        if t_max[axis] < t_max[best] {
            best = axis;
        }
    }
    best
}

/// Walk every voxel a single ray crosses, given it already intersects the
/// grid at parameter `tmin`. Shared by both the scalar and batched entry
/// points.
fn step_ray(origin: Vector3<f64>, dir: Vector3<f64>, tmin: f64, grid: &VoxelGrid) -> Vec<[usize; 3]> {
    let grid_min = grid.grid_min();
    let voxel_size = grid.voxel_size();
    let resolution = grid.resolution();

    let t0 = tmin.max(0.0);
    let start = origin + dir * t0;

    let step = [sign(dir.x), sign(dir.y), sign(dir.z)];

    let mut current: [i64; 3] = std::array::from_fn(|a| {
        let idx = ((start[a] - grid_min[a]) / voxel_size[a]).floor() as i64;
        idx.clamp(0, resolution[a] as i64 - 1)
    });

    let mut t_max = [0.0f64; 3];
    let mut delta = [0.0f64; 3];
    for a in 0..3 {
        if dir[a] == 0.0 {
            t_max[a] = f64::INFINITY;
            delta[a] = f64::INFINITY;
            continue;
        }
        let next_boundary = grid_min[a]
            + (current[a] as f64 + if step[a] > 0 { 1.0 } else { 0.0 }) * voxel_size[a];
        t_max[a] = (next_boundary - origin[a]) / dir[a];
        delta[a] = voxel_size[a] / dir[a].abs();
    }

    let mut out = Vec::with_capacity(16);
    out.push([current[0] as usize, current[1] as usize, current[2] as usize]);

    while out.len() < MAX_RAY_STEPS {
        let axis = argmin_axis(t_max);
        current[axis] += step[axis] as i64;
        if current[axis] < 0 || current[axis] >= resolution[axis] as i64 {
            break;
        }
        t_max[axis] += delta[axis];
        out.push([current[0] as usize, current[1] as usize, current[2] as usize]);
    }

    out
}

/// Scalar reference entry point: ray-AABB then DDA for a single ray.
pub fn trace_ray_scalar(origin: Vector3<f64>, dir: Vector3<f64>, grid: &VoxelGrid) -> Vec<[usize; 3]> {
    match ray_aabb_intersect(origin, dir, grid.grid_min(), grid.grid_max()) {
        Some(tmin) => step_ray(origin, dir, tmin, grid),
        None => Vec::new(),
    }
}

/// Batched ray-AABB + DDA over every ray in `rays`. Returns the concatenated
/// `(indices, weights)` pair, aligned row-wise, in ray input order. Rays
/// that miss the grid contribute nothing.
pub fn raycast_batch(rays: &RayBatch, grid: &VoxelGrid) -> (Vec<[usize; 3]>, Vec<u64>) {
    let mut indices = Vec::new();
    let mut weights = Vec::new();

    for i in 0..rays.len() {
        let ray = rays.ray(i);
        if let Some(tmin) = ray_aabb_intersect(ray.origin, ray.dir, grid.grid_min(), grid.grid_max()) {
            let voxels = step_ray(ray.origin, ray.dir, tmin, grid);
            weights.extend(std::iter::repeat(ray.weight).take(voxels.len()));
            indices.extend(voxels);
        }
    }

    (indices, weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> VoxelGrid {
        VoxelGrid::new((0.0, 0.0), (10.0, 10.0), 10.0, [10, 10, 10]).unwrap()
    }

    #[test]
    fn origin_strictly_inside_grid_intersects_with_nonpositive_tmin() {
        let grid = small_grid();
        let origin = Vector3::new(5.0, 5.0, 5.0);
        let dir = Vector3::new(1.0, 0.3, -0.2);
        let tmin = ray_aabb_intersect(origin, dir, grid.grid_min(), grid.grid_max()).unwrap();
        assert!(tmin <= 0.0);
    }

    #[test]
    fn origin_outside_pointing_in_has_positive_tmin() {
        let grid = small_grid();
        let dir = Vector3::new(0.0, 0.0, -1.0);
        // epsilon behind grid_min - dir*eps, i.e. just above the top face.
        let origin = grid.grid_max() - dir * 1e-6;
        let tmin = ray_aabb_intersect(origin, dir, grid.grid_min(), grid.grid_max()).unwrap();
        assert!(tmin > 0.0);
    }

    #[test]
    fn axis_parallel_ray_with_origin_in_slab_is_accepted() {
        let grid = small_grid();
        // dir has a zero Y component; origin is within the Y slab.
        let origin = Vector3::new(-5.0, 5.0, 5.0);
        let dir = Vector3::new(1.0, 0.0, 0.0);
        let tmin = ray_aabb_intersect(origin, dir, grid.grid_min(), grid.grid_max());
        assert!(tmin.is_some());
    }

    #[test]
    fn coverage_law_holds_for_a_diagonal_ray() {
        let grid = small_grid();
        let origin = Vector3::new(-1.0, -1.0, -1.0);
        let dir = Vector3::new(1.0, 1.0, 1.0);
        let voxels = trace_ray_scalar(origin, dir, &grid);
        assert!(!voxels.is_empty());
        assert!(voxels.len() <= MAX_RAY_STEPS);
        for pair in voxels.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let diffs: Vec<i64> = (0..3)
                .map(|i| a[i] as i64 - b[i] as i64)
                .filter(|d| *d != 0)
                .collect();
            assert_eq!(diffs.len(), 1, "consecutive voxels must differ on exactly one axis");
            assert_eq!(diffs[0].abs(), 1);
        }
    }

    #[test]
    fn determinism_running_twice_is_identical() {
        let grid = small_grid();
        let origin = Vector3::new(-1.0, 2.0, 3.0);
        let dir = Vector3::new(1.0, 0.7, -0.4);
        let a = trace_ray_scalar(origin, dir, &grid);
        let b = trace_ray_scalar(origin, dir, &grid);
        assert_eq!(a, b);
    }

    #[test]
    fn batch_equals_concatenation_of_scalar_traces() {
        use camera_geometry::RayBatch;

        let grid = small_grid();
        let origins = vec![
            Vector3::new(-1.0, -1.0, -1.0),
            Vector3::new(5.0, 5.0, 11.0),
            Vector3::new(100.0, 100.0, 100.0), // misses entirely
        ];
        let dirs = vec![
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(1.0, 0.0, 0.0),
        ];
        let weights = vec![1u64, 7, 9];

        let batch = RayBatch {
            origins: origins.clone(),
            dirs: dirs.clone(),
            weights: weights.clone(),
        };

        let (batch_idx, batch_w) = raycast_batch(&batch, &grid);

        let mut expect_idx = Vec::new();
        let mut expect_w = Vec::new();
        for i in 0..origins.len() {
            let voxels = trace_ray_scalar(origins[i], dirs[i], &grid);
            expect_w.extend(std::iter::repeat(weights[i]).take(voxels.len()));
            expect_idx.extend(voxels);
        }

        assert_eq!(batch_idx, expect_idx);
        assert_eq!(batch_w, expect_w);
    }

    #[test]
    fn ray_missing_grid_contributes_nothing() {
        let grid = small_grid();
        let origin = Vector3::new(100.0, 100.0, 100.0);
        let dir = Vector3::new(1.0, 0.0, 0.0);
        let voxels = trace_ray_scalar(origin, dir, &grid);
        assert!(voxels.is_empty());
    }

    #[test]
    fn traversal_starts_at_clamped_entry_cell() {
        let grid = small_grid();
        let origin = Vector3::new(5.0, 5.0, 20.0);
        let dir = Vector3::new(0.0, 0.0, -1.0);
        let voxels = trace_ray_scalar(origin, dir, &grid);
        assert_eq!(voxels[0], [5, 5, 9]);
        assert_eq!(voxels.last().unwrap(), &[5, 5, 0]);
    }
}
