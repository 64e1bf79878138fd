use std::fs;
use std::path::PathBuf;

use aloft_types::{ObjectRecord, RawSensorRecord};
use tracing::warn;

use crate::{Batcher, Exporter, SensorIoError};

/// Reference `Batcher` reading a JSON array of records from a file-backed
/// queue path, standing in for a blocking read of a named FIFO. A missing
/// or malformed file is logged and treated as an empty batch so the next
/// tick retries, per the batch-source I/O failure policy.
#[derive(Debug)]
pub struct QueueBatcher {
    path: PathBuf,
}

impl QueueBatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Batcher for QueueBatcher {
    fn batch(&mut self) -> Result<Vec<RawSensorRecord>, SensorIoError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "queue batcher read failed");
                return Ok(Vec::new());
            }
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records = serde_json::from_str(&contents)?;
        // The queue is drained once read; an empty array marks "no data".
        let _ = fs::write(&self.path, "[]");
        Ok(records)
    }
}

/// Reference `Exporter` writing a JSON array of records to a file-backed
/// queue path, standing in for a push onto a downstream FIFO.
#[derive(Debug)]
pub struct FifoExporter {
    path: PathBuf,
}

impl FifoExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Exporter for FifoExporter {
    fn export(&mut self, records: &[ObjectRecord]) -> Result<(), SensorIoError> {
        let json = serde_json::to_string(records)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
