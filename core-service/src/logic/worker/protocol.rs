//! Worker wire format
//!
//! Training:   input  = `[TrainingRow, ...]`
//!             output = `TrainingResponse`
//! Prediction: input  = `{ "features": NormalizedFeatures, "model": ModelParameters }`
//!             output = `{ "anomaly": 0|1, "anomaly_score": 0.0-1.0 }`
//!
//! The worker's exit status is the success signal.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::statistical::StatisticalWorker;
use super::WorkerError;
use crate::logic::features::layout::{FEATURE_COUNT, TEMP_MEAN, VIB_RMS, CURRENT_RMS};
use crate::logic::features::SensorReading;
use crate::logic::model::{ModelParameters, Verdict};

// ============================================================================
// TRAINING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub temp_mean: f64,
    pub vib_rms: f64,
    pub current_rms: f64,
    #[serde(default)]
    pub edge_health: f64,
}

impl TrainingRow {
    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        [self.temp_mean, self.vib_rms, self.current_rms]
    }
}

impl From<&SensorReading> for TrainingRow {
    fn from(reading: &SensorReading) -> Self {
        Self {
            temp_mean: reading.temp_mean,
            vib_rms: reading.vib_rms,
            current_rms: reading.current_rms,
            edge_health: reading.edge_health.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResponse {
    pub contamination: f64,
    pub n_estimators: u32,
    pub anomaly_threshold: f64,
    pub feature_means: [f64; FEATURE_COUNT],
    pub feature_stds: [f64; FEATURE_COUNT],
    pub anomaly_rate: f64,
}

impl TrainingResponse {
    pub fn validate(self) -> Result<Self, WorkerError> {
        let finite = self.contamination.is_finite()
            && self.anomaly_threshold.is_finite()
            && self.anomaly_rate.is_finite()
            && self.feature_means.iter().all(|v| v.is_finite())
            && self.feature_stds.iter().all(|v| v.is_finite());
        if !finite {
            return Err(WorkerError::Invalid("non-finite training parameter".to_string()));
        }
        Ok(self)
    }

    pub fn parameters(&self) -> ModelParameters {
        ModelParameters {
            contamination: self.contamination,
            n_estimators: self.n_estimators,
            anomaly_threshold: self.anomaly_threshold,
            feature_means: self.feature_means,
            feature_stds: self.feature_stds,
        }
    }
}

// ============================================================================
// PREDICTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeatures {
    pub temp_mean: f64,
    pub vib_rms: f64,
    pub current_rms: f64,
}

impl NormalizedFeatures {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            temp_mean: values[TEMP_MEAN],
            vib_rms: values[VIB_RMS],
            current_rms: values[CURRENT_RMS],
        }
    }

    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        [self.temp_mean, self.vib_rms, self.current_rms]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub features: NormalizedFeatures,
    pub model: ModelParameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub anomaly: u8,
    pub anomaly_score: f64,
}

impl PredictionResponse {
    /// Anomaly must be 0/1; the score must be finite and is clamped into [0, 1]
    pub fn into_verdict(self) -> Result<Verdict, WorkerError> {
        if self.anomaly > 1 {
            return Err(WorkerError::Invalid(format!("anomaly flag {}", self.anomaly)));
        }
        if !self.anomaly_score.is_finite() {
            return Err(WorkerError::Invalid("non-finite anomaly score".to_string()));
        }
        Ok(Verdict {
            anomaly: self.anomaly,
            anomaly_score: self.anomaly_score.clamp(0.0, 1.0),
        })
    }
}

// ============================================================================
// FILE SERVING (worker side)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    Train,
    Predict,
}

/// Answer one request file with the in-process statistical worker
pub fn serve_file(
    worker: &StatisticalWorker,
    mode: WorkerMode,
    input: &Path,
    output: &Path,
) -> Result<(), WorkerError> {
    let data = std::fs::read(input)?;

    let json = match mode {
        WorkerMode::Train => {
            let rows: Vec<TrainingRow> = serde_json::from_slice(&data)?;
            let response = worker.fit(&rows)?;
            serde_json::to_vec_pretty(&response)?
        }
        WorkerMode::Predict => {
            let request: PredictionRequest = serde_json::from_slice(&data)?;
            let response = worker.score(&request);
            serde_json::to_vec_pretty(&response)?
        }
    };

    std::fs::write(output, json)?;
    Ok(())
}
