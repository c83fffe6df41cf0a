//! Commands - API for the ingestion adapter and CLI
//!
//! Every command returns `Result<T, String>`: errors are flattened into a
//! message for the caller, and `predict` never fails.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine_status::{EngineStatus, StoreStatus};
use crate::constants;
use crate::logic::config::EngineConfig;
use crate::logic::feature_store::{FeatureStoreError, SqliteFeatureStore};
use crate::logic::features::{SensorFeatures, FEATURE_COUNT, FEATURE_LAYOUT};
use crate::logic::model::{
    HealthEngine, ModelStatus, ModelStore, PredictionResult, TrainOutcome, TrainingSettings,
    TrainingState,
};
use crate::logic::scheduler::{RetrainScheduler, SchedulerStatus};
use crate::logic::worker;

/// Rows per transaction during bulk import
const IMPORT_BATCH_SIZE: usize = 1000;

// ============================================================================
// STATE
// ============================================================================

/// Everything the commands operate on, wired from one `EngineConfig`
pub struct AppState {
    pub config: EngineConfig,
    pub store: Arc<SqliteFeatureStore>,
    pub engine: Arc<HealthEngine>,
    pub scheduler: RetrainScheduler,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Result<Self, FeatureStoreError> {
        let store = Arc::new(SqliteFeatureStore::open(&config.feature_db_path)?);
        let worker = worker::from_config(&config);
        log::info!("Modeling worker: {}", worker.name());

        let engine = Arc::new(HealthEngine::new(
            TrainingSettings::from(&config),
            store.clone(),
            worker,
            ModelStore::new(config.model_path.clone()),
            Arc::new(TrainingState::new()),
        ));
        let scheduler = RetrainScheduler::from_config(engine.clone(), &config);

        Ok(Self {
            config,
            store,
            engine,
            scheduler,
        })
    }
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One reading as received from a device or an import file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub features: SensorFeatures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub id: i64,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    /// Absent when a model feature is missing
    pub prediction: Option<PredictionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub device_id: String,
    pub outcome: String, // "committed" | "already_running" | "insufficient_data" | "worker_failed"
    pub samples: Option<usize>,
    pub required: Option<usize>,
    pub anomaly_rate: Option<f64>,
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

// ============================================================================
// PREDICTION COMMANDS
// ============================================================================

pub async fn predict(state: &AppState, features: SensorFeatures) -> Result<PredictionResult, String> {
    Ok(state.engine.predict(&features).await)
}

/// Store a reading, score it when complete and persist the prediction beside it
pub async fn ingest_reading(state: &AppState, input: ReadingInput) -> Result<IngestResult, String> {
    let device_id = input
        .device_id
        .unwrap_or_else(|| state.config.device_id.clone());
    let timestamp = input.timestamp.unwrap_or_else(Utc::now);
    let features = input.features;

    let id = {
        let store = state.store.clone();
        let device = device_id.clone();
        tokio::task::spawn_blocking(move || store.insert_reading(&device, timestamp, &features))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?
    };

    if !features.is_complete() {
        log::debug!("Reading {} stored without prediction: missing features", id);
        return Ok(IngestResult {
            id,
            device_id,
            timestamp,
            prediction: None,
        });
    }

    let prediction = state.engine.predict(&features).await;

    let store = state.store.clone();
    let to_record = prediction.clone();
    tokio::task::spawn_blocking(move || store.record_prediction(id, &to_record))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    Ok(IngestResult {
        id,
        device_id,
        timestamp,
        prediction: Some(prediction),
    })
}

// ============================================================================
// MODEL COMMANDS
// ============================================================================

pub async fn get_model_status(state: &AppState) -> Result<ModelStatus, String> {
    Ok(state.engine.get_model_status())
}

/// Manual training trigger; a run already in flight is reported, not queued
pub async fn train_model(state: &AppState, device_id: Option<String>) -> Result<TrainReport, String> {
    let device_id = device_id.unwrap_or_else(|| state.config.device_id.clone());

    let outcome = state
        .engine
        .train(&device_id)
        .await
        .map_err(|e| e.to_string())?;

    let report = match outcome {
        TrainOutcome::Committed(model) => TrainReport {
            device_id,
            outcome: "committed".to_string(),
            samples: Some(model.training_samples),
            required: None,
            anomaly_rate: Some(model.anomaly_rate),
            trained_at: Some(model.trained_at),
            reason: None,
        },
        TrainOutcome::AlreadyRunning => TrainReport {
            device_id,
            outcome: "already_running".to_string(),
            samples: None,
            required: None,
            anomaly_rate: None,
            trained_at: None,
            reason: None,
        },
        TrainOutcome::InsufficientData { found, required } => TrainReport {
            device_id,
            outcome: "insufficient_data".to_string(),
            samples: Some(found),
            required: Some(required),
            anomaly_rate: None,
            trained_at: None,
            reason: None,
        },
        TrainOutcome::WorkerFailed { reason } => TrainReport {
            device_id,
            outcome: "worker_failed".to_string(),
            samples: None,
            required: None,
            anomaly_rate: None,
            trained_at: None,
            reason: Some(reason),
        },
    };
    Ok(report)
}

// ============================================================================
// STATUS COMMANDS
// ============================================================================

pub async fn get_scheduler_status(state: &AppState) -> Result<SchedulerStatus, String> {
    Ok(state.scheduler.get_status())
}

pub async fn get_engine_status(state: &AppState) -> Result<EngineStatus, String> {
    let store = state.store.clone();
    let device = state.config.device_id.clone();
    let stored_readings = tokio::task::spawn_blocking(move || store.count(&device))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    Ok(EngineStatus {
        version: constants::APP_VERSION.to_string(),
        feature_layout: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        feature_count: FEATURE_COUNT,
        model: state.engine.get_model_status(),
        engine: state.engine.engine_status(),
        scheduler: state.scheduler.get_status(),
        store: StoreStatus {
            device_id: state.config.device_id.clone(),
            stored_readings,
            training_window: state.config.training_window,
            min_training_samples: state.config.min_training_samples,
        },
    })
}

// ============================================================================
// IMPORT
// ============================================================================

/// Bulk-load newline-delimited JSON readings. Unparseable lines are skipped.
pub async fn import_readings(state: &AppState, path: &Path) -> Result<ImportReport, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let default_device = state.config.device_id.clone();
    let now = Utc::now();
    let mut skipped = 0;
    let mut by_device: Vec<(String, Vec<(DateTime<Utc>, SensorFeatures)>)> = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let input: ReadingInput = match serde_json::from_str(line) {
            Ok(input) => input,
            Err(e) => {
                log::warn!("Skipping line {}: {}", line_no + 1, e);
                skipped += 1;
                continue;
            }
        };

        let device = input.device_id.unwrap_or_else(|| default_device.clone());
        let row = (input.timestamp.unwrap_or(now), input.features);
        match by_device.iter_mut().find(|(d, _)| *d == device) {
            Some((_, rows)) => rows.push(row),
            None => by_device.push((device, vec![row])),
        }
    }

    let store = state.store.clone();
    let imported = tokio::task::spawn_blocking(move || -> Result<usize, FeatureStoreError> {
        let mut total = 0;
        for (device, rows) in &by_device {
            for batch in rows.chunks(IMPORT_BATCH_SIZE) {
                total += store.insert_many(device, batch)?;
            }
        }
        Ok(total)
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())?;

    log::info!("Imported {} readings from {} ({} skipped)", imported, path.display(), skipped);
    Ok(ImportReport { imported, skipped })
}
