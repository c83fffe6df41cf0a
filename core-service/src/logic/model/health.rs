//! Health Derivation - verdict to health score, status and RUL
//!
//! Every function here is pure: same features and verdict, same output.
//! Health and RUL always use the raw (non-normalized) features.

use crate::logic::features::layout::{
    any_above, CRITICAL_THRESHOLDS, WARN_THRESHOLDS, TEMP_MEAN, VIB_RMS, CURRENT_RMS,
};
use crate::logic::features::SensorFeatures;

use super::types::{PredictionMethod, PredictionResult, Status, Verdict};

// ============================================================================
// CONSTANTS
// ============================================================================

const FALLBACK_ANOMALY_SCORE: f64 = 0.8;
const FALLBACK_WARNING_SCORE: f64 = 0.3;

/// Health penalty per feature in the warning band
const HEALTH_PENALTIES: [f64; 3] = [20.0, 15.0, 10.0];

/// Anomalous readings never report more than this
const ANOMALY_HEALTH_CAP: f64 = 50.0;
const ANOMALY_HEALTH_OFFSET: f64 = 30.0;

/// Critical RUL is capped at one day
const ANOMALY_RUL_MAX: f64 = 24.0;

const RUL_MIN: f64 = 1.0;
const RUL_MAX: f64 = 1000.0;

/// RUL multipliers per feature: (critical band, warning band)
const RUL_FACTORS: [(f64, f64); 3] = [(0.5, 0.7), (0.6, 0.8), (0.5, 0.8)];

// ============================================================================
// FALLBACK VERDICT
// ============================================================================

/// Threshold verdict used when no model is committed or the worker fails
pub fn fallback_verdict(features: &SensorFeatures) -> Verdict {
    let values = features.values();

    if any_above(&values, &CRITICAL_THRESHOLDS) {
        Verdict { anomaly: 1, anomaly_score: FALLBACK_ANOMALY_SCORE }
    } else if any_above(&values, &WARN_THRESHOLDS) {
        Verdict { anomaly: 0, anomaly_score: FALLBACK_WARNING_SCORE }
    } else {
        Verdict { anomaly: 0, anomaly_score: 0.0 }
    }
}

// ============================================================================
// DERIVATIONS
// ============================================================================

pub fn health_score(features: &SensorFeatures, anomaly: bool) -> f64 {
    let edge_health = features.edge_health();

    if anomaly {
        return (edge_health - ANOMALY_HEALTH_OFFSET).clamp(0.0, ANOMALY_HEALTH_CAP);
    }

    if edge_health > 0.0 {
        return edge_health.clamp(0.0, 100.0);
    }

    let values = features.values();
    let mut score: f64 = 100.0;
    for i in 0..values.len() {
        if values[i] > WARN_THRESHOLDS[i] {
            score -= HEALTH_PENALTIES[i];
        }
    }
    score.clamp(0.0, 100.0)
}

/// No hysteresis, no history
pub fn status(anomaly: bool, features: &SensorFeatures) -> Status {
    if anomaly {
        Status::Critical
    } else if any_above(&features.values(), &WARN_THRESHOLDS) {
        Status::Degrading
    } else {
        Status::Healthy
    }
}

/// Piecewise-linear base RUL from health, in hours
pub fn base_rul(health: f64) -> f64 {
    if health >= 80.0 {
        720.0 + ((health - 80.0) / 20.0) * 280.0
    } else if health >= 50.0 {
        168.0 + ((health - 50.0) / 30.0) * 552.0
    } else {
        24.0 + (health / 50.0) * 144.0
    }
}

/// Multiplicative severity adjustment; factors compose per feature
pub fn severity_adjustment(features: &SensorFeatures) -> f64 {
    let values = features.values();
    let mut adjustment = 1.0;

    for i in [TEMP_MEAN, VIB_RMS, CURRENT_RMS] {
        let (critical, warning) = RUL_FACTORS[i];
        if values[i] > CRITICAL_THRESHOLDS[i] {
            adjustment *= critical;
        } else if values[i] > WARN_THRESHOLDS[i] {
            adjustment *= warning;
        }
    }
    adjustment
}

pub fn rul_hours(features: &SensorFeatures, anomaly: bool, health: f64) -> f64 {
    if anomaly {
        return (health / 2.0).clamp(RUL_MIN, ANOMALY_RUL_MAX);
    }

    let rul = (base_rul(health) * severity_adjustment(features)).round();
    rul.clamp(RUL_MIN, RUL_MAX)
}

/// Single formula path shared by the model and fallback arms
pub fn derive(features: &SensorFeatures, verdict: Verdict, method: PredictionMethod) -> PredictionResult {
    let anomaly = verdict.is_anomaly();
    let health = health_score(features, anomaly);

    PredictionResult {
        anomaly: verdict.anomaly,
        anomaly_score: verdict.anomaly_score,
        health_score: health,
        status: status(anomaly, features),
        rul_hours: rul_hours(features, anomaly, health),
        method,
    }
}

pub fn fallback_prediction(features: &SensorFeatures) -> PredictionResult {
    derive(features, fallback_verdict(features), PredictionMethod::Fallback)
}
