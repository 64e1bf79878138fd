use std::path::Path;

use aloft_types::ObjectRecord;
use rusqlite::{params, Connection};

use crate::{Exporter, SensorIoError};

/// Reference `Exporter` writing into the `ProcessedData` table named in the
/// external-interfaces contract. The schema's `CameraID` column carries the
/// tracked object's id, matching the table name given in the interface spec
/// even though the value is an object id rather than a camera id.
pub struct SqliteExporter {
    conn: Connection,
}

impl SqliteExporter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SensorIoError> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ProcessedData (
                CameraID INTEGER NOT NULL,
                Timestamp REAL NOT NULL,
                Latitude REAL NOT NULL,
                Altitude REAL NOT NULL,
                Longitude REAL NOT NULL,
                VelocityX REAL NOT NULL,
                VelocityY REAL NOT NULL,
                VelocityZ REAL NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl Exporter for SqliteExporter {
    fn export(&mut self, records: &[ObjectRecord]) -> Result<(), SensorIoError> {
        let tx = self.conn.transaction()?;
        for record in records {
            tx.execute(
                "INSERT INTO ProcessedData
                    (CameraID, Timestamp, Latitude, Altitude, Longitude, VelocityX, VelocityY, VelocityZ)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.timestamp,
                    record.position[0],
                    record.position[2],
                    record.position[1],
                    record.velocity[0],
                    record.velocity[1],
                    record.velocity[2],
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
