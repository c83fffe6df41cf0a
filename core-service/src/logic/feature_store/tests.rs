use super::{FeatureStore, SqliteFeatureStore};
use crate::logic::features::SensorFeatures;
use crate::logic::model::{PredictionMethod, PredictionResult, Status};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn seed(store: &SqliteFeatureStore, device: &str, n: usize) {
    let rows: Vec<_> = (0..n)
        .map(|i| {
            (
                base_time() + Duration::seconds(i as i64),
                SensorFeatures::new(40.0 + i as f64, 1.0, 2.0),
            )
        })
        .collect();
    store.insert_many(device, &rows).unwrap();
}

#[test]
fn test_read_recent_newest_first_and_limited() {
    let store = SqliteFeatureStore::in_memory().unwrap();
    seed(&store, "PM_001", 10);

    let readings = store.read_recent("PM_001", 4).unwrap();
    assert_eq!(readings.len(), 4);
    assert_eq!(readings[0].timestamp, base_time() + Duration::seconds(9));
    assert!(readings.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    assert_eq!(readings[0].temp_mean, 49.0);
}

#[test]
fn test_read_recent_skips_incomplete_rows_and_other_devices() {
    let store = SqliteFeatureStore::in_memory().unwrap();
    seed(&store, "PM_001", 3);
    seed(&store, "PM_002", 5);

    let partial = SensorFeatures {
        temp_mean: Some(50.0),
        vib_rms: None,
        current_rms: Some(2.0),
        edge_health: Some(80.0),
    };
    store
        .insert_reading("PM_001", base_time() + Duration::hours(1), &partial)
        .unwrap();

    let readings = store.read_recent("PM_001", 100).unwrap();
    assert_eq!(readings.len(), 3);
    assert_eq!(store.count("PM_001").unwrap(), 4);
}

#[test]
fn test_delete_older_than_is_strict() {
    let store = SqliteFeatureStore::in_memory().unwrap();
    seed(&store, "PM_001", 10);
    seed(&store, "PM_002", 10);

    let deleted = store
        .delete_older_than("PM_001", base_time() + Duration::seconds(4))
        .unwrap();
    assert_eq!(deleted, 4);
    assert_eq!(store.count("PM_001").unwrap(), 6);
    assert_eq!(store.count("PM_002").unwrap(), 10);

    let oldest = store.read_recent("PM_001", 100).unwrap().pop().unwrap();
    assert_eq!(oldest.timestamp, base_time() + Duration::seconds(4));
}

#[test]
fn test_record_prediction() {
    let store = SqliteFeatureStore::in_memory().unwrap();
    let id = store
        .insert_reading("PM_001", base_time(), &SensorFeatures::new(45.0, 1.2, 2.1))
        .unwrap();
    assert_eq!(store.prediction_status(id).unwrap(), None);

    let result = PredictionResult {
        anomaly: 0,
        anomaly_score: 0.0,
        health_score: 85.0,
        status: Status::Healthy,
        rul_hours: 790.0,
        method: PredictionMethod::Fallback,
    };
    store.record_prediction(id, &result).unwrap();
    assert_eq!(store.prediction_status(id).unwrap().as_deref(), Some("healthy"));
}

#[test]
fn test_open_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("sensor_logs.sqlite3");

    {
        let store = SqliteFeatureStore::open(&path).unwrap();
        seed(&store, "PM_001", 2);
    }

    let reopened = SqliteFeatureStore::open(&path).unwrap();
    assert_eq!(reopened.read_recent("PM_001", 10).unwrap().len(), 2);
}
