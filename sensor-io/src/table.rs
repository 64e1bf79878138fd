use std::collections::HashMap;

use aloft_types::RawSensorRecord;

use crate::window::largest_window_in_threshold;
use crate::{Batcher, SensorIoError};

/// One row of the (out-of-scope, externally owned) `SensorData` table.
#[derive(Debug, Clone)]
pub struct Row {
    pub row_id: u64,
    pub cam_id: u32,
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub rotation_deg: [f64; 3],
    pub fov_deg: f64,
    pub image_path: String,
    pub is_deleted: bool,
}

/// Reference `Batcher` over an in-memory stand-in for the `SensorData`
/// table: selects the oldest non-deleted row per camera, applies
/// [`largest_window_in_threshold`] to the sorted candidate timestamps, and
/// marks the selected rows consumed.
#[derive(Debug)]
pub struct TableBatcher {
    rows: Vec<Row>,
    next_row_id: u64,
    tau: f64,
    hard_delete: bool,
}

impl TableBatcher {
    pub fn new(tau: f64) -> Self {
        Self {
            rows: Vec::new(),
            next_row_id: 0,
            tau,
            hard_delete: false,
        }
    }

    /// Hard-delete consumed rows instead of the default soft-delete
    /// (`is_deleted = true`). See design notes for why soft-delete is the
    /// default.
    pub fn with_hard_delete(mut self) -> Self {
        self.hard_delete = true;
        self
    }

    pub fn insert(&mut self, record: &RawSensorRecord) {
        let row_id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.push(Row {
            row_id,
            cam_id: record.cam_id,
            timestamp: record.timestamp,
            latitude: record.position[0],
            longitude: record.position[1],
            altitude: record.position[2],
            rotation_deg: record.rotation_deg,
            fov_deg: record.fov_deg,
            image_path: record.mask_path.clone(),
            is_deleted: false,
        });
    }

    pub fn len_undeleted(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_deleted).count()
    }
}

fn row_to_record(row: &Row) -> RawSensorRecord {
    RawSensorRecord {
        cam_id: row.cam_id,
        timestamp: row.timestamp,
        rotation_deg: row.rotation_deg,
        position: [row.latitude, row.longitude, row.altitude],
        mask_path: row.image_path.clone(),
        fov_deg: row.fov_deg,
    }
}

impl Batcher for TableBatcher {
    fn batch(&mut self) -> Result<Vec<RawSensorRecord>, SensorIoError> {
        let mut oldest_per_cam: HashMap<u32, usize> = HashMap::new();
        for (i, row) in self.rows.iter().enumerate() {
            if row.is_deleted {
                continue;
            }
            match oldest_per_cam.get(&row.cam_id) {
                Some(&best_i) => {
                    let best = &self.rows[best_i];
                    if (row.timestamp, row.row_id) < (best.timestamp, best.row_id) {
                        oldest_per_cam.insert(row.cam_id, i);
                    }
                }
                None => {
                    oldest_per_cam.insert(row.cam_id, i);
                }
            }
        }

        if oldest_per_cam.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<usize> = oldest_per_cam.into_values().collect();
        candidates.sort_by(|&a, &b| self.rows[a].timestamp.partial_cmp(&self.rows[b].timestamp).unwrap());

        let timestamps: Vec<f64> = candidates.iter().map(|&i| self.rows[i].timestamp).collect();
        let (left, right) = largest_window_in_threshold(&timestamps, self.tau);
        let selected: Vec<usize> = candidates[left..=right].to_vec();

        let records: Vec<RawSensorRecord> = selected.iter().map(|&i| row_to_record(&self.rows[i])).collect();

        if self.hard_delete {
            let to_remove: std::collections::HashSet<u64> =
                selected.iter().map(|&i| self.rows[i].row_id).collect();
            self.rows.retain(|r| !to_remove.contains(&r.row_id));
        } else {
            for &i in &selected {
                self.rows[i].is_deleted = true;
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cam_id: u32, timestamp: f64) -> RawSensorRecord {
        RawSensorRecord {
            cam_id,
            timestamp,
            rotation_deg: [0.0, 0.0, 0.0],
            position: [0.0, 0.0, 0.0],
            mask_path: format!("cam{cam_id}.png"),
            fov_deg: 90.0,
        }
    }

    #[test]
    fn e4_selects_first_three_rows_and_soft_deletes_them() {
        let mut batcher = TableBatcher::new(0.2);
        batcher.insert(&record(1, 1.00));
        batcher.insert(&record(2, 1.05));
        batcher.insert(&record(3, 1.10));
        batcher.insert(&record(4, 1.60));
        batcher.insert(&record(5, 1.62));

        let batch = batcher.batch().unwrap();
        assert_eq!(batch.len(), 3);
        let mut timestamps: Vec<f64> = batch.iter().map(|r| r.timestamp).collect();
        timestamps.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(timestamps, vec![1.00, 1.05, 1.10]);

        assert_eq!(batcher.len_undeleted(), 2);
    }

    #[test]
    fn hard_delete_removes_rows_entirely() {
        let mut batcher = TableBatcher::new(0.2).with_hard_delete();
        batcher.insert(&record(1, 1.00));
        batcher.insert(&record(2, 1.05));
        let _ = batcher.batch().unwrap();
        assert_eq!(batcher.rows.len(), 0);
    }

    #[test]
    fn empty_table_returns_empty_batch() {
        let mut batcher = TableBatcher::new(0.2);
        assert!(batcher.batch().unwrap().is_empty());
    }

    #[test]
    fn only_one_row_per_camera_is_considered() {
        let mut batcher = TableBatcher::new(10.0);
        batcher.insert(&record(1, 1.00));
        batcher.insert(&record(1, 1.01)); // same camera, should not both be candidates
        batcher.insert(&record(2, 1.02));
        let batch = batcher.batch().unwrap();
        assert_eq!(batch.len(), 2);
    }
}
