use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::features::FEATURE_COUNT;

// ============================================================================
// MODEL PARAMETERS
// ============================================================================

/// Parameters produced by the modeling worker and handed back on every prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub contamination: f64,
    pub n_estimators: u32,
    pub anomaly_threshold: f64,
    pub feature_means: [f64; FEATURE_COUNT],
    pub feature_stds: [f64; FEATURE_COUNT],
}

/// Per-feature (mean, std) computed over the training window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub mean: [f64; FEATURE_COUNT],
    pub std: [f64; FEATURE_COUNT],
}

impl NormalizationParams {
    /// Population mean/std per feature. `None` for an empty window or when
    /// a statistic is not finite.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Option<Self> {
        if rows.is_empty() || rows.iter().flatten().any(|v| !v.is_finite()) {
            return None;
        }

        let mut mean = [0.0; FEATURE_COUNT];
        let mut std = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            mean[i] = column_mean(rows, i);
            std[i] = column_std(rows, i, mean[i]);
        }

        let params = Self { mean, std };
        params.is_finite().then_some(params)
    }

    pub fn is_finite(&self) -> bool {
        self.mean.iter().chain(self.std.iter()).all(|v| v.is_finite())
    }

    /// z = (x - mean) / std. A zero-variance feature carries no signal and
    /// passes through raw.
    pub fn normalize(&self, values: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut normalized = *values;
        for i in 0..FEATURE_COUNT {
            let std = self.std[i];
            if std != 0.0 && std.is_finite() {
                normalized[i] = (values[i] - self.mean[i]) / std;
            }
        }
        normalized
    }
}

fn column_mean(rows: &[[f64; FEATURE_COUNT]], i: usize) -> f64 {
    let n = rows.len() as f64;
    let sum: f64 = rows.iter().map(|row| row[i]).sum();
    if sum.is_finite() {
        return sum / n;
    }
    // Sum overflowed; divide first
    rows.iter().map(|row| row[i] / n).sum()
}

fn column_std(rows: &[[f64; FEATURE_COUNT]], i: usize, mean: f64) -> f64 {
    let n = rows.len() as f64;
    let var = rows.iter().map(|row| (row[i] - mean).powi(2)).sum::<f64>() / n;
    if var.is_finite() {
        return var.sqrt();
    }

    // Squares overflowed; rescale by the largest magnitude
    let scale = rows.iter().map(|row| row[i].abs()).fold(mean.abs(), f64::max);
    let var = rows
        .iter()
        .map(|row| (row[i] / scale - mean / scale).powi(2))
        .sum::<f64>()
        / n;
    scale * var.sqrt()
}

// ============================================================================
// COMMITTED MODEL
// ============================================================================

/// The model predictions read. Replaced wholesale by a successful training run.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedModel {
    pub device_id: String,
    pub params: ModelParameters,
    pub scaler: NormalizationParams,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub anomaly_rate: f64,
}

// ============================================================================
// PREDICTION OUTPUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Degrading,
    Critical,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Healthy => "healthy",
            Status::Degrading => "degrading",
            Status::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which arm supplied the anomaly verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMethod {
    Model,
    Fallback,
}

/// Anomaly verdict before health/RUL derivation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub anomaly: u8,
    pub anomaly_score: f64,
}

impl Verdict {
    pub fn is_anomaly(&self) -> bool {
        self.anomaly == 1
    }
}

/// Prediction output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub anomaly: u8,             // 0 | 1
    pub anomaly_score: f64,      // 0.0 - 1.0
    pub health_score: f64,       // 0 - 100
    pub status: Status,
    pub rul_hours: f64,          // 1 - 1000
    pub method: PredictionMethod,
}

/// Model lifecycle snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub is_trained: bool,
    pub last_training_time: Option<DateTime<Utc>>,
    pub is_training: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_population_std() {
        let rows = [[1.0, 10.0, 5.0], [3.0, 10.0, 5.0]];
        let params = NormalizationParams::fit(&rows).unwrap();
        assert_eq!(params.mean, [2.0, 10.0, 5.0]);
        assert_eq!(params.std, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fit_empty_window() {
        assert!(NormalizationParams::fit(&[]).is_none());
    }

    #[test]
    fn test_fit_survives_extreme_magnitudes() {
        let mut rows = vec![[45.0, 1.5, 2.0]; 198];
        rows.push([1e308, 1.5, 2.0]);
        rows.push([1e308, 1.5, 2.0]);

        let params = NormalizationParams::fit(&rows).unwrap();
        assert!(params.is_finite());
        assert!(params.mean[0] > 1e305 && params.std[0] > 1e306);
        assert_eq!(params.mean[1], 1.5);
        assert_eq!(params.std[2], 0.0);
    }

    #[test]
    fn test_fit_rejects_non_finite_rows() {
        let rows = [[45.0, 1.5, 2.0], [f64::INFINITY, 1.5, 2.0]];
        assert!(NormalizationParams::fit(&rows).is_none());
    }

    #[test]
    fn test_zero_variance_passes_through() {
        let params = NormalizationParams {
            mean: [50.0, 2.0, 3.0],
            std: [5.0, 0.0, 1.0],
        };
        let z = params.normalize(&[60.0, 7.5, 1.0]);
        assert_eq!(z, [2.0, 7.5, -2.0]);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Degrading).unwrap(), "\"degrading\"");
        assert_eq!(Status::Critical.to_string(), "critical");
    }

    #[test]
    fn test_model_status_camel_case() {
        let status = ModelStatus {
            is_trained: false,
            last_training_time: None,
            is_training: true,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isTrained"], false);
        assert_eq!(json["isTraining"], true);
        assert!(json["lastTrainingTime"].is_null());
    }
}
