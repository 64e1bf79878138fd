//! Tick orchestrator: wires Batcher -> CameraGeometry -> RayBuilder ->
//! VoxelTracer -> PercentileExtractor -> Clusterer -> ClusterTracker ->
//! Exporter into the single-threaded-per-instance core described by the
//! concurrency model.

pub mod config;
pub mod continuous;

use std::sync::atomic::{AtomicBool, Ordering};

use aloft_types::ObjectRecord;
use cluster_tracker::ClusterTracker;
use sensor_io::{Batcher, Exporter};
use thiserror::Error;
use tracing::{info, instrument, warn};
use voxel_tracer::{GridError, VoxelTracer};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("grid configuration error: {0}")]
    Grid(#[from] GridError),
}

/// Back-pressure behavior for the continuous-mode bounded input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    Block,
    DropNewest,
}

/// Control-endpoint request body for live grid reconfiguration.
#[derive(Debug, Clone, PartialEq)]
pub struct GridReconfigureRequest {
    pub grid_min: [f64; 2],
    pub grid_max: [f64; 2],
    pub height: f64,
    pub resolution: [usize; 3],
}

/// Owns the VoxelTracer and ClusterTracker for the lifetime of a deployment.
/// Not `Sync`: a tick is an atomic unit and no other thread may touch this
/// pipeline's state while `tick()` is running.
pub struct Pipeline {
    tracer: VoxelTracer,
    tracker: ClusterTracker,
    percentile_p: f64,
    batcher: Box<dyn Batcher + Send>,
    exporter: Box<dyn Exporter + Send>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid_min: (f64, f64),
        grid_max: (f64, f64),
        height_m: f64,
        resolution: [usize; 3],
        percentile_p: f64,
        max_cluster_distance: f64,
        max_cluster_age: u64,
        batcher: Box<dyn Batcher + Send>,
        exporter: Box<dyn Exporter + Send>,
    ) -> Result<Self, PipelineError> {
        let tracer = VoxelTracer::new(grid_min, grid_max, height_m, resolution)?;
        let tracker = ClusterTracker::new(max_cluster_distance, max_cluster_age);
        Ok(Self {
            tracer,
            tracker,
            percentile_p,
            batcher,
            exporter,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.tracker.frame_count()
    }

    /// Rebind the grid's bounds then its resolution, per the "Parameter
    /// update" control endpoint contract. Echoes the applied values back.
    pub fn apply_reconfigure(
        &mut self,
        req: &GridReconfigureRequest,
    ) -> Result<GridReconfigureRequest, PipelineError> {
        self.tracer.set_grid_size(
            (req.grid_min[0], req.grid_min[1]),
            (req.grid_max[0], req.grid_max[1]),
            req.height,
        )?;
        self.tracer.set_grid_resolution(req.resolution)?;
        Ok(req.clone())
    }

    /// Delete a mask file consumed by this tick. Failure is logged, never
    /// propagated: cleanup is best-effort.
    fn cleanup_mask(path: &str) {
        if let Err(err) = std::fs::remove_file(path) {
            warn!(path, error = %err, "failed to delete consumed mask file");
        }
    }

    #[cfg(test)]
    fn grid_cells_sum(&self) -> u64 {
        self.tracer.grid().cells().sum()
    }

    /// Run one tick. Camera-local and exporter failures are caught and
    /// logged inside the tick; this never returns an `Err` for steady-state
    /// processing, only for the invariants enforced elsewhere (grid
    /// reconfiguration has its own fallible path).
    #[instrument(skip(self))]
    pub fn tick(&mut self) -> Vec<ObjectRecord> {
        let batch = match self.batcher.batch() {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, "batch source failed, treating as empty");
                Vec::new()
            }
        };
        if batch.is_empty() {
            return Vec::new();
        }

        let avg_timestamp =
            batch.iter().map(|r| r.timestamp).sum::<f64>() / batch.len() as f64;

        for raw in &batch {
            let cam = match camera_geometry::process(raw) {
                Ok(cam) => cam,
                Err(err) => {
                    warn!(cam_id = raw.cam_id, error = %err, "skipping camera: mask unreadable");
                    continue;
                }
            };
            let mask = match camera_geometry::load_mask(&raw.mask_path) {
                Ok(mask) => mask,
                Err(err) => {
                    warn!(cam_id = raw.cam_id, error = %err, "skipping camera: mask unreadable");
                    continue;
                }
            };
            let Some(rays) = camera_geometry::build(&cam, &mask) else {
                continue;
            };
            let (voxels, weights) = self.tracer.raycast_batch(&rays);
            self.tracer.add_grid_data(&voxels, &weights);
            Self::cleanup_mask(&raw.mask_path);
        }

        let top_voxels = percentile::extract(self.tracer.grid().cells(), self.percentile_p);
        let Some(top_voxels) = top_voxels else {
            info!("no voxels above percentile threshold, skipping batch");
            self.tracer.clear();
            self.tracker.track(&[], avg_timestamp);
            self.tracker.cleanup();
            return Vec::new();
        };

        let voxel_size = self.tracer.grid().voxel_size();
        let grid_min = self.tracer.grid().grid_min();
        let points: Vec<[f64; 3]> = top_voxels
            .iter()
            .map(|idx| {
                [
                    grid_min.x + (idx[0] as f64 + 0.5) * voxel_size.x,
                    grid_min.y + (idx[1] as f64 + 0.5) * voxel_size.y,
                    grid_min.z + (idx[2] as f64 + 0.5) * voxel_size.z,
                ]
            })
            .collect();

        let eps = 3f64.sqrt() * self.tracer.grid().max_voxel_edge();
        let centroids = clustering::cluster(&points, eps);

        let ids = self.tracker.track(&centroids, avg_timestamp);
        let positions = self.tracker.position(&ids);
        let velocities = self.tracker.velocity(&ids);

        let records: Vec<ObjectRecord> = ids
            .iter()
            .map(|id| ObjectRecord {
                id: *id,
                timestamp: avg_timestamp,
                position: positions[id],
                velocity: velocities[id],
            })
            .collect();

        self.tracker.cleanup();

        if let Err(err) = self.exporter.export(&records) {
            warn!(error = %err, "exporter failed for this tick");
        }

        self.tracer.clear();

        info!(
            cameras = batch.len(),
            clusters = centroids.len(),
            records = records.len(),
            "tick complete"
        );

        records
    }
}

/// Run `pipeline.tick()` until `cancel` is set, checking the flag at each
/// tick boundary only (cooperative cancellation, no preemption mid-tick).
pub fn run_loop(pipeline: &mut Pipeline, cancel: &AtomicBool) {
    while !cancel.load(Ordering::Relaxed) {
        pipeline.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aloft_types::RawSensorRecord;
    use sensor_io::CliExporter;
    use std::collections::VecDeque;

    struct EmptyBatcher(VecDeque<Vec<RawSensorRecord>>);

    impl Batcher for EmptyBatcher {
        fn batch(&mut self) -> Result<Vec<RawSensorRecord>, sensor_io::SensorIoError> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            (0.0, 0.0),
            (10.0, 10.0),
            10.0,
            [10, 10, 10],
            99.9,
            1.0,
            3,
            Box::new(EmptyBatcher(VecDeque::new())),
            Box::new(CliExporter),
        )
        .unwrap()
    }

    #[test]
    fn reconfigure_clears_grid_and_echoes_request() {
        let mut p = pipeline();
        p.tracer.add_grid_data(&[[1, 1, 1]], &[5]);
        assert_eq!(p.grid_cells_sum(), 5);

        let req = GridReconfigureRequest {
            grid_min: [0.0, 0.0],
            grid_max: [20.0, 20.0],
            height: 20.0,
            resolution: [5, 5, 5],
        };
        let echoed = p.apply_reconfigure(&req).unwrap();
        assert_eq!(echoed, req);
        assert_eq!(p.grid_cells_sum(), 0);
    }

    #[test]
    fn reconfigure_rejects_non_positive_extent_and_keeps_previous_grid() {
        let mut p = pipeline();
        let bad = GridReconfigureRequest {
            grid_min: [0.0, 0.0],
            grid_max: [0.0, 0.0],
            height: 10.0,
            resolution: [5, 5, 5],
        };
        assert!(p.apply_reconfigure(&bad).is_err());
    }

    #[test]
    fn truly_empty_batch_skips_tick_without_advancing_frame_count() {
        let mut p = pipeline();
        p.tick();
        assert_eq!(p.frame_count(), 0);
    }
}
