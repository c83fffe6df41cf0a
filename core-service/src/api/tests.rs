use std::io::Write;
use std::path::Path;

use chrono::{Duration, TimeZone, Utc};

use super::commands::*;
use crate::logic::config::{EngineConfig, WorkerKind};
use crate::logic::features::SensorFeatures;
use crate::logic::model::{PredictionMethod, Status};

fn state(dir: &Path) -> AppState {
    let mut config = EngineConfig::from_env().with_data_dir(dir.to_path_buf());
    config.worker = WorkerKind::Builtin;
    config.device_id = "PM_001".to_string();
    config.training_window = 2500;
    config.min_training_samples = 100;
    config.retain_after_prune = 500;
    AppState::new(config).unwrap()
}

fn write_jsonl(path: &Path, n: usize) {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let mut file = std::fs::File::create(path).unwrap();
    for i in 0..n {
        let input = ReadingInput {
            device_id: None,
            timestamp: Some(start + Duration::seconds(i as i64)),
            features: SensorFeatures::new(40.0 + (i % 10) as f64, 1.0 + (i % 5) as f64 * 0.1, 2.0)
                .with_edge_health(90.0),
        };
        writeln!(file, "{}", serde_json::to_string(&input).unwrap()).unwrap();
    }
    writeln!(file, "this is not json").unwrap();
    writeln!(file).unwrap();
}

#[test]
fn test_reading_input_is_flat() {
    let input: ReadingInput = serde_json::from_str(
        r#"{"device_id":"PM_007","temp_mean":45.0,"vib_rms":1.2,"current_rms":2.1,"edge_health":85}"#,
    )
    .unwrap();
    assert_eq!(input.device_id.as_deref(), Some("PM_007"));
    assert!(input.timestamp.is_none());
    assert_eq!(input.features.edge_health, Some(85.0));
    assert!(input.features.is_complete());
}

#[tokio::test]
async fn test_ingest_complete_reading_persists_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());

    let result = ingest_reading(
        &state,
        ReadingInput {
            features: SensorFeatures::new(45.0, 1.2, 2.1).with_edge_health(85.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let prediction = result.prediction.unwrap();
    assert_eq!(result.device_id, "PM_001");
    assert_eq!(prediction.status, Status::Healthy);
    assert_eq!(prediction.method, PredictionMethod::Fallback);
    assert_eq!(
        state.store.prediction_status(result.id).unwrap().as_deref(),
        Some("healthy")
    );
}

#[tokio::test]
async fn test_ingest_partial_reading_is_stored_unscored() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());

    let result = ingest_reading(
        &state,
        ReadingInput {
            device_id: Some("PM_002".to_string()),
            features: SensorFeatures {
                temp_mean: Some(45.0),
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(result.prediction.is_none());
    assert_eq!(state.store.count("PM_002").unwrap(), 1);
    assert!(state.store.prediction_status(result.id).unwrap().is_none());
}

#[tokio::test]
async fn test_train_model_reports_insufficient_data() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    let file = dir.path().join("few.jsonl");
    write_jsonl(&file, 50);
    import_readings(&state, &file).await.unwrap();

    let report = train_model(&state, None).await.unwrap();
    assert_eq!(report.outcome, "insufficient_data");
    assert_eq!(report.samples, Some(50));
    assert_eq!(report.required, Some(100));
    assert!(!get_model_status(&state).await.unwrap().is_trained);
}

#[tokio::test]
async fn test_import_train_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    let file = dir.path().join("history.jsonl");
    write_jsonl(&file, 150);

    let imported = import_readings(&state, &file).await.unwrap();
    assert_eq!(imported, ImportReport { imported: 150, skipped: 1 });

    let report = train_model(&state, Some("PM_001".to_string())).await.unwrap();
    assert_eq!(report.outcome, "committed");
    assert_eq!(report.samples, Some(150));
    assert!(state.config.model_path.exists());

    let prediction = predict(&state, SensorFeatures::new(44.0, 1.2, 2.0)).await.unwrap();
    assert_eq!(prediction.method, PredictionMethod::Model);

    let status = get_engine_status(&state).await.unwrap();
    assert!(status.model.is_trained);
    assert!(status.engine.model_loaded);
    assert_eq!(status.engine.worker, "builtin");
    assert_eq!(status.engine.inference_count, 1);
    assert_eq!(status.store.stored_readings, 150);
    assert_eq!(status.feature_layout, vec!["temp_mean", "vib_rms", "current_rms"]);
    assert!(!status.scheduler.is_running);

    let scheduler = get_scheduler_status(&state).await.unwrap();
    assert_eq!(scheduler.active_timer_count, 0);
    assert!(scheduler.model_status.is_trained);
}

#[cfg(unix)]
#[tokio::test]
async fn test_train_model_reports_worker_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::from_env().with_data_dir(dir.path().to_path_buf());
    config.worker = WorkerKind::Process;
    config.worker_train_cmd = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
    config.worker_tmp_dir = dir.path().to_path_buf();
    config.device_id = "PM_001".to_string();
    config.min_training_samples = 100;
    let state = AppState::new(config).unwrap();

    let file = dir.path().join("history.jsonl");
    write_jsonl(&file, 150);
    import_readings(&state, &file).await.unwrap();

    let report = train_model(&state, None).await.unwrap();
    assert_eq!(report.outcome, "worker_failed");
    assert!(report.reason.is_some());
    assert!(!state.config.model_path.exists());
    assert!(!get_model_status(&state).await.unwrap().is_trained);
}

#[tokio::test]
async fn test_import_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    assert!(import_readings(&state, &dir.path().join("missing.jsonl")).await.is_err());
}
