//! External Batcher/Exporter interfaces and their reference adapters.
//!
//! The edge extractor, real SQLite/Redis plumbing, and the map dashboard are
//! out of scope (see the core's purpose statement); what lives here is the
//! *interface* the core pipeline consumes, plus simple reference adapters
//! that satisfy it for tests, offline replay, and small deployments.

mod queue;
mod sqlite;
mod table;
mod window;

pub use queue::{FifoExporter, QueueBatcher};
pub use sqlite::SqliteExporter;
pub use table::{Row, TableBatcher};
pub use window::largest_window_in_threshold;

use aloft_types::{ObjectRecord, RawSensorRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A batch source: returns a set of records whose timestamps are within a
/// configured window of each other. An I/O failure is logged upstream and
/// treated as an empty batch; the next tick retries.
pub trait Batcher {
    fn batch(&mut self) -> Result<Vec<RawSensorRecord>, SensorIoError>;
}

/// A sink for tracked-object results.
pub trait Exporter {
    fn export(&mut self, records: &[ObjectRecord]) -> Result<(), SensorIoError>;
}

/// Writes one record per line to stdout.
#[derive(Debug, Default)]
pub struct CliExporter;

impl Exporter for CliExporter {
    fn export(&mut self, records: &[ObjectRecord]) -> Result<(), SensorIoError> {
        for record in records {
            println!("{}", serde_json::to_string(record)?);
        }
        Ok(())
    }
}
