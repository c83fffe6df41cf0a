//! In-process statistical worker
//!
//! Scores a reading by its largest absolute z-score. Training picks the
//! threshold so that `contamination` of the training window sits above it.

use async_trait::async_trait;

use super::protocol::{PredictionRequest, PredictionResponse, TrainingResponse, TrainingRow};
use super::{ModelingWorker, WorkerError};
use crate::logic::features::FEATURE_COUNT;
use crate::logic::model::NormalizationParams;

/// Expected share of anomalous training rows
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Ensemble size reported to the model record
pub const DEFAULT_N_ESTIMATORS: u32 = 100;

#[derive(Debug, Clone)]
pub struct StatisticalWorker {
    contamination: f64,
    n_estimators: u32,
    min_samples: usize,
}

impl StatisticalWorker {
    pub fn new(min_samples: usize) -> Self {
        Self {
            contamination: DEFAULT_CONTAMINATION,
            n_estimators: DEFAULT_N_ESTIMATORS,
            min_samples,
        }
    }

    /// Largest absolute component among features that carry signal.
    /// A zero-variance feature was passed through raw and is ignored.
    fn outlier_score(z: &[f64; FEATURE_COUNT], stds: &[f64; FEATURE_COUNT]) -> f64 {
        z.iter()
            .zip(stds.iter())
            .filter(|(_, std)| **std != 0.0)
            .map(|(v, _)| v.abs())
            .fold(0.0, f64::max)
    }

    pub fn fit(&self, rows: &[TrainingRow]) -> Result<TrainingResponse, WorkerError> {
        if rows.len() < self.min_samples.max(1) {
            return Err(WorkerError::Invalid(format!(
                "Insufficient data: {} samples. Need at least {}.",
                rows.len(),
                self.min_samples
            )));
        }

        let values: Vec<[f64; FEATURE_COUNT]> = rows.iter().map(TrainingRow::values).collect();
        let scaler = NormalizationParams::fit(&values)
            .ok_or_else(|| WorkerError::Invalid("empty training set".to_string()))?;

        let mut scores: Vec<f64> = values
            .iter()
            .map(|v| Self::outlier_score(&scaler.normalize(v), &scaler.std))
            .collect();
        scores.sort_by(|a, b| a.total_cmp(b));

        let n = scores.len();
        let rank = ((1.0 - self.contamination) * n as f64).ceil() as usize;
        let threshold = scores[rank.clamp(1, n) - 1];
        let anomalies = scores.iter().filter(|s| **s > threshold).count();

        Ok(TrainingResponse {
            contamination: self.contamination,
            n_estimators: self.n_estimators,
            anomaly_threshold: threshold,
            feature_means: scaler.mean,
            feature_stds: scaler.std,
            anomaly_rate: anomalies as f64 / n as f64,
        })
    }

    pub fn score(&self, request: &PredictionRequest) -> PredictionResponse {
        let score = Self::outlier_score(&request.features.values(), &request.model.feature_stds);
        let threshold = request.model.anomaly_threshold;

        let anomaly = u8::from(score > threshold);
        let anomaly_score = if threshold > 0.0 {
            (score / (2.0 * threshold)).clamp(0.0, 1.0)
        } else {
            f64::from(anomaly)
        };

        PredictionResponse { anomaly, anomaly_score }
    }
}

#[async_trait]
impl ModelingWorker for StatisticalWorker {
    async fn train_batch(&self, rows: &[TrainingRow]) -> Result<TrainingResponse, WorkerError> {
        self.fit(rows)
    }

    async fn predict_one(&self, request: &PredictionRequest) -> Result<PredictionResponse, WorkerError> {
        Ok(self.score(request))
    }

    fn name(&self) -> &'static str {
        "builtin"
    }
}
