//! Sensor Feature Vectors
//!
//! `SensorFeatures` is the loosely-typed input accepted from ingestion
//! (any field may be absent). `SensorReading` is a stored reading with all
//! three model features present, as returned by the feature store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::layout::{FEATURE_COUNT, TEMP_MEAN, VIB_RMS, CURRENT_RMS};

// ============================================================================
// INPUT FEATURES
// ============================================================================

/// Features as reported by a device. Missing or non-finite values read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vib_rms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_rms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_health: Option<f64>,
}

fn or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

impl SensorFeatures {
    pub fn new(temp_mean: f64, vib_rms: f64, current_rms: f64) -> Self {
        Self {
            temp_mean: Some(temp_mean),
            vib_rms: Some(vib_rms),
            current_rms: Some(current_rms),
            edge_health: None,
        }
    }

    pub fn with_edge_health(mut self, edge_health: f64) -> Self {
        self.edge_health = Some(edge_health);
        self
    }

    /// Model features in layout order
    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        let mut values = [0.0; FEATURE_COUNT];
        values[TEMP_MEAN] = or_zero(self.temp_mean);
        values[VIB_RMS] = or_zero(self.vib_rms);
        values[CURRENT_RMS] = or_zero(self.current_rms);
        values
    }

    pub fn temp_mean(&self) -> f64 {
        or_zero(self.temp_mean)
    }

    pub fn vib_rms(&self) -> f64 {
        or_zero(self.vib_rms)
    }

    pub fn current_rms(&self) -> f64 {
        or_zero(self.current_rms)
    }

    pub fn edge_health(&self) -> f64 {
        or_zero(self.edge_health)
    }

    /// All three model features present (edge_health is optional)
    pub fn is_complete(&self) -> bool {
        self.temp_mean.is_some() && self.vib_rms.is_some() && self.current_rms.is_some()
    }
}

// ============================================================================
// STORED READING
// ============================================================================

/// Immutable stored reading with every model feature present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub temp_mean: f64,
    pub vib_rms: f64,
    pub current_rms: f64,
    #[serde(default)]
    pub edge_health: Option<f64>,
}

impl SensorReading {
    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        let mut values = [0.0; FEATURE_COUNT];
        values[TEMP_MEAN] = self.temp_mean;
        values[VIB_RMS] = self.vib_rms;
        values[CURRENT_RMS] = self.current_rms;
        values
    }

    pub fn features(&self) -> SensorFeatures {
        SensorFeatures {
            temp_mean: Some(self.temp_mean),
            vib_rms: Some(self.vib_rms),
            current_rms: Some(self.current_rms),
            edge_health: self.edge_health,
        }
    }
}
