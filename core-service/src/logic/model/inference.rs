//! Inference Engine - prediction, training and model lifecycle
//!
//! `predict` is a two-arm decision: a committed model plus a successful
//! worker call, or the threshold fallback. Both arms return through
//! `health::derive`, and `predict` never fails.
//!
//! `train` is single-flight: the `TrainingState` flag is claimed before the
//! first await, so an overlapping call observes it and returns immediately.
//! A commit writes the model file first and then swaps the in-memory
//! snapshot, which is the only cut-over point predictions can observe.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::logic::config::EngineConfig;
use crate::logic::feature_store::{FeatureStore, FeatureStoreError};
use crate::logic::features::{SensorFeatures, SensorReading};
use crate::logic::worker::{
    ModelingWorker, NormalizedFeatures, PredictionRequest, TrainingRow, WorkerError,
};

use super::health;
use super::storage::ModelStore;
use super::types::{
    CommittedModel, ModelStatus, NormalizationParams, PredictionMethod, PredictionResult, Verdict,
};
use super::validate::ModelStoreError;

// ============================================================================
// TRAINING STATE
// ============================================================================

/// Process-wide training flag and last commit time, shared with the scheduler
#[derive(Debug, Default)]
pub struct TrainingState {
    is_training: AtomicBool,
    last_training_time: RwLock<Option<DateTime<Utc>>>,
}

/// Clears the training flag when dropped, on every exit path
pub struct TrainingGuard<'a> {
    state: &'a TrainingState,
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.state.is_training.store(false, Ordering::Release);
    }
}

impl TrainingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag; `None` if a run is already in flight
    pub fn try_begin(&self) -> Option<TrainingGuard<'_>> {
        self.is_training
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TrainingGuard { state: self })
    }

    pub fn is_training(&self) -> bool {
        self.is_training.load(Ordering::Acquire)
    }

    pub fn last_training_time(&self) -> Option<DateTime<Utc>> {
        *self.last_training_time.read()
    }

    fn set_last_training_time(&self, at: DateTime<Utc>) {
        *self.last_training_time.write() = Some(at);
    }
}

// ============================================================================
// SETTINGS / OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingSettings {
    pub window: usize,
    pub min_samples: usize,
    pub retain_after_prune: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            window: crate::constants::DEFAULT_TRAINING_WINDOW,
            min_samples: crate::constants::DEFAULT_MIN_TRAINING_SAMPLES,
            retain_after_prune: crate::constants::DEFAULT_RETAIN_AFTER_PRUNE,
        }
    }
}

impl From<&EngineConfig> for TrainingSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            window: config.training_window,
            min_samples: config.min_training_samples,
            retain_after_prune: config.retain_after_prune,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    /// A new model was written and is now the committed model
    Committed(Arc<CommittedModel>),
    /// Another run held the flag; nothing was read or written
    AlreadyRunning,
    /// Too few valid readings; the committed model is unchanged
    InsufficientData { found: usize, required: usize },
    /// The worker failed or returned unusable parameters; the committed
    /// model is unchanged
    WorkerFailed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("feature store: {0}")]
    FeatureStore(#[from] FeatureStoreError),

    #[error("training window produced a non-finite scaler")]
    InvalidScaler,

    #[error("model store: {0}")]
    Storage(#[from] ModelStoreError),
}

/// Engine counters for status surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub model_loaded: bool,
    pub device_id: Option<String>,
    pub trained_at: Option<DateTime<Utc>>,
    pub training_samples: Option<usize>,
    pub anomaly_rate: Option<f64>,
    pub worker: String,
    pub inference_count: u64,
    pub fallback_count: u64,
    pub avg_latency_ms: f64,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct HealthEngine {
    settings: TrainingSettings,
    feature_store: Arc<dyn FeatureStore>,
    worker: Arc<dyn ModelingWorker>,
    model_store: ModelStore,
    committed: RwLock<Option<Arc<CommittedModel>>>,
    state: Arc<TrainingState>,

    inference_count: AtomicU64,
    fallback_count: AtomicU64,
    latency_sum_us: AtomicU64,
}

impl HealthEngine {
    /// Build the engine and load any committed model from disk.
    /// A missing or unreadable model leaves the engine untrained.
    pub fn new(
        settings: TrainingSettings,
        feature_store: Arc<dyn FeatureStore>,
        worker: Arc<dyn ModelingWorker>,
        model_store: ModelStore,
        state: Arc<TrainingState>,
    ) -> Self {
        let committed = match model_store.load() {
            Ok(Some(model)) => {
                log::info!(
                    "Loaded model for {} trained at {} ({} samples)",
                    model.device_id,
                    model.trained_at.to_rfc3339(),
                    model.training_samples
                );
                state.set_last_training_time(model.trained_at);
                Some(Arc::new(model))
            }
            Ok(None) => {
                log::info!("No committed model at {} - using fallback heuristics", model_store.path().display());
                None
            }
            Err(e) => {
                log::warn!("Model load failed: {}. Starting untrained.", e);
                None
            }
        };

        Self {
            settings,
            feature_store,
            worker,
            model_store,
            committed: RwLock::new(committed),
            state,
            inference_count: AtomicU64::new(0),
            fallback_count: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
        }
    }

    // ------------------------------------------------------------------------
    // PREDICTION
    // ------------------------------------------------------------------------

    pub async fn predict(&self, features: &SensorFeatures) -> PredictionResult {
        let start = Instant::now();
        let committed = self.committed.read().clone();

        let result = match committed {
            Some(model) => match self.model_verdict(&model, features).await {
                Ok(verdict) => health::derive(features, verdict, PredictionMethod::Model),
                Err(e) => {
                    log::error!("Worker prediction failed ({}), using fallback", e);
                    health::fallback_prediction(features)
                }
            },
            None => {
                log::debug!("Model not trained yet, using fallback");
                health::fallback_prediction(features)
            }
        };

        if result.method == PredictionMethod::Fallback {
            self.fallback_count.fetch_add(1, Ordering::Relaxed);
        }
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);

        result
    }

    async fn model_verdict(
        &self,
        model: &CommittedModel,
        features: &SensorFeatures,
    ) -> Result<Verdict, WorkerError> {
        let normalized = model.scaler.normalize(&features.values());
        let request = PredictionRequest {
            features: NormalizedFeatures::from_values(normalized),
            model: model.params.clone(),
        };

        self.worker.predict_one(&request).await?.into_verdict()
    }

    // ------------------------------------------------------------------------
    // TRAINING
    // ------------------------------------------------------------------------

    /// Train on the device's recent readings and commit the result.
    /// Returns `AlreadyRunning` without side effects if a run is in flight.
    /// Worker failures come back as `WorkerFailed`; `Err` means the feature
    /// store or the model store failed.
    pub async fn train(&self, device_id: &str) -> Result<TrainOutcome, TrainError> {
        let Some(_guard) = self.state.try_begin() else {
            log::warn!("ML model training already in progress");
            return Ok(TrainOutcome::AlreadyRunning);
        };

        log::info!("Starting ML model training for device: {}", device_id);

        let result = self.run_training(device_id).await;
        if let Err(e) = &result {
            log::error!("ML model training failed for {}: {}", device_id, e);
        }
        result
    }

    async fn run_training(&self, device_id: &str) -> Result<TrainOutcome, TrainError> {
        let window = self.read_window(device_id).await?;

        let required = self.settings.min_samples.max(1);
        if window.len() < required {
            log::warn!(
                "Insufficient data for training. Need at least {} samples, got {}",
                required,
                window.len()
            );
            return Ok(TrainOutcome::InsufficientData {
                found: window.len(),
                required,
            });
        }

        log::info!("Training with {} samples", window.len());

        // Cutoff is fixed at read time; rows ingested during training survive pruning
        let retain = self.settings.retain_after_prune;
        let prune_cutoff = (retain > 0 && window.len() > retain).then(|| window[retain - 1].timestamp);

        let values: Vec<_> = window.iter().map(SensorReading::values).collect();
        let scaler = NormalizationParams::fit(&values).ok_or(TrainError::InvalidScaler)?;

        let rows: Vec<TrainingRow> = window.iter().map(TrainingRow::from).collect();
        let response = match self.worker.train_batch(&rows).await.and_then(|r| r.validate()) {
            Ok(response) => response,
            Err(e) => {
                log::error!("Worker training failed for {}: {}", device_id, e);
                return Ok(TrainOutcome::WorkerFailed {
                    reason: e.to_string(),
                });
            }
        };

        let model = CommittedModel {
            device_id: device_id.to_string(),
            params: response.parameters(),
            scaler,
            trained_at: Utc::now(),
            training_samples: window.len(),
            anomaly_rate: response.anomaly_rate,
        };

        // Disk first; on failure the previous model stays committed
        self.model_store.save(&model)?;

        let model = Arc::new(model);
        *self.committed.write() = Some(Arc::clone(&model));
        self.state.set_last_training_time(model.trained_at);

        log::info!(
            "ML model trained successfully. Anomaly rate: {:.4}",
            response.anomaly_rate
        );

        if let Some(cutoff) = prune_cutoff {
            match self.prune(device_id, cutoff).await {
                Ok(deleted) => log::info!(
                    "Deleted {} old training records to optimize storage",
                    deleted
                ),
                Err(e) => log::warn!("Pruning old training records failed: {}", e),
            }
        }

        Ok(TrainOutcome::Committed(model))
    }

    async fn read_window(&self, device_id: &str) -> Result<Vec<SensorReading>, FeatureStoreError> {
        let store = Arc::clone(&self.feature_store);
        let device = device_id.to_string();
        let limit = self.settings.window;

        tokio::task::spawn_blocking(move || store.read_recent(&device, limit))
            .await
            .map_err(|e| FeatureStoreError::Task(e.to_string()))?
    }

    async fn prune(&self, device_id: &str, cutoff: DateTime<Utc>) -> Result<usize, FeatureStoreError> {
        let store = Arc::clone(&self.feature_store);
        let device = device_id.to_string();

        tokio::task::spawn_blocking(move || store.delete_older_than(&device, cutoff))
            .await
            .map_err(|e| FeatureStoreError::Task(e.to_string()))?
    }

    // ------------------------------------------------------------------------
    // STATUS
    // ------------------------------------------------------------------------

    pub fn get_model_status(&self) -> ModelStatus {
        ModelStatus {
            is_trained: self.committed.read().is_some(),
            last_training_time: self.state.last_training_time(),
            is_training: self.state.is_training(),
        }
    }

    pub fn is_training(&self) -> bool {
        self.state.is_training()
    }

    pub fn committed_model(&self) -> Option<Arc<CommittedModel>> {
        self.committed.read().clone()
    }

    pub fn engine_status(&self) -> EngineStats {
        let model = self.committed_model();
        let count = self.inference_count.load(Ordering::Relaxed);
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f64 / count as f64) / 1000.0 } else { 0.0 };

        EngineStats {
            model_loaded: model.is_some(),
            device_id: model.as_ref().map(|m| m.device_id.clone()),
            trained_at: model.as_ref().map(|m| m.trained_at),
            training_samples: model.as_ref().map(|m| m.training_samples),
            anomaly_rate: model.as_ref().map(|m| m.anomaly_rate),
            worker: self.worker.name().to_string(),
            inference_count: count,
            fallback_count: self.fallback_count.load(Ordering::Relaxed),
            avg_latency_ms: avg,
        }
    }
}
