//! SQLite-backed sensor log

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{FeatureStore, FeatureStoreError};
use crate::logic::features::{SensorFeatures, SensorReading};
use crate::logic::model::PredictionResult;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sensor_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    temp_mean REAL,
    vib_rms REAL,
    current_rms REAL,
    edge_health REAL,
    anomaly INTEGER,
    anomaly_score REAL,
    health_score REAL,
    status TEXT,
    rul_hours REAL
);

CREATE INDEX IF NOT EXISTS idx_sensor_logs_device_ts
    ON sensor_logs (device_id, timestamp DESC);
"#;

pub struct SqliteFeatureStore {
    conn: Mutex<Connection>,
}

impl SqliteFeatureStore {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, FeatureStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, FeatureStoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, FeatureStoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Store a reading as received; absent features are stored as NULL
    pub fn insert_reading(
        &self,
        device_id: &str,
        timestamp: DateTime<Utc>,
        features: &SensorFeatures,
    ) -> Result<i64, FeatureStoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sensor_logs (device_id, timestamp, temp_mean, vib_rms, current_rms, edge_health)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                device_id,
                timestamp.timestamp_millis(),
                features.temp_mean,
                features.vib_rms,
                features.current_rms,
                features.edge_health,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Bulk insert inside a single transaction
    pub fn insert_many(
        &self,
        device_id: &str,
        rows: &[(DateTime<Utc>, SensorFeatures)],
    ) -> Result<usize, FeatureStoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sensor_logs (device_id, timestamp, temp_mean, vib_rms, current_rms, edge_health)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (timestamp, f) in rows {
                stmt.execute(params![
                    device_id,
                    timestamp.timestamp_millis(),
                    f.temp_mean,
                    f.vib_rms,
                    f.current_rms,
                    f.edge_health,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Attach a prediction to a stored reading
    pub fn record_prediction(&self, row_id: i64, result: &PredictionResult) -> Result<(), FeatureStoreError> {
        self.conn.lock().execute(
            "UPDATE sensor_logs
             SET anomaly = ?1, anomaly_score = ?2, health_score = ?3, status = ?4, rul_hours = ?5
             WHERE id = ?6",
            params![
                result.anomaly,
                result.anomaly_score,
                result.health_score,
                result.status.as_str(),
                result.rul_hours,
                row_id,
            ],
        )?;
        Ok(())
    }

    /// Stored prediction status for a row, if any
    pub fn prediction_status(&self, row_id: i64) -> Result<Option<String>, FeatureStoreError> {
        let status = self
            .conn
            .lock()
            .query_row(
                "SELECT status FROM sensor_logs WHERE id = ?1",
                params![row_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(status.flatten())
    }

    /// Total rows for a device, complete or not
    pub fn count(&self, device_id: &str) -> Result<usize, FeatureStoreError> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM sensor_logs WHERE device_id = ?1",
            params![device_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl FeatureStore for SqliteFeatureStore {
    fn read_recent(&self, device_id: &str, limit: usize) -> Result<Vec<SensorReading>, FeatureStoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp, temp_mean, vib_rms, current_rms, edge_health
             FROM sensor_logs
             WHERE device_id = ?1
               AND temp_mean IS NOT NULL
               AND vib_rms IS NOT NULL
               AND current_rms IS NOT NULL
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![device_id, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ))
        })?;

        let mut readings = Vec::new();
        for row in rows {
            let (millis, temp_mean, vib_rms, current_rms, edge_health) = row?;
            let timestamp = DateTime::from_timestamp_millis(millis)
                .ok_or(FeatureStoreError::InvalidTimestamp(millis))?;
            readings.push(SensorReading {
                timestamp,
                temp_mean,
                vib_rms,
                current_rms,
                edge_health,
            });
        }
        Ok(readings)
    }

    fn delete_older_than(&self, device_id: &str, cutoff: DateTime<Utc>) -> Result<usize, FeatureStoreError> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM sensor_logs WHERE device_id = ?1 AND timestamp < ?2",
            params![device_id, cutoff.timestamp_millis()],
        )?;
        Ok(deleted)
    }
}
