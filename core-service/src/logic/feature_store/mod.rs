//! Feature Store - Historical Sensor Readings
//!
//! The engine consumes two operations: a bounded newest-first window read
//! and a retention delete. `SqliteFeatureStore` is the durable backend.

pub mod sqlite;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};

use crate::logic::features::SensorReading;

pub use sqlite::SqliteFeatureStore;

#[derive(Debug, thiserror::Error)]
pub enum FeatureStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp in row {0}")]
    InvalidTimestamp(i64),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Read/delete contract used by training
pub trait FeatureStore: Send + Sync {
    /// Up to `limit` readings with all model features present, newest first
    fn read_recent(&self, device_id: &str, limit: usize) -> Result<Vec<SensorReading>, FeatureStoreError>;

    /// Delete every reading strictly older than `cutoff`, returning the count
    fn delete_older_than(&self, device_id: &str, cutoff: DateTime<Utc>) -> Result<usize, FeatureStoreError>;
}
