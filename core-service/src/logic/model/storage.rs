//! Model Store - committed model persistence
//!
//! One JSON document per engine, overwritten wholesale on each commit.
//! Writes go to a sibling temp file which is then renamed over the target,
//! so readers only ever see the old or the new document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{CommittedModel, ModelParameters, NormalizationParams};
use super::validate::{validate_record, ModelStoreError};

/// Current on-disk format
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// On-disk layout: `{ model, scaler, lastTrainingTime, ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub format_version: u32,
    pub device_id: String,
    pub model: ModelParameters,
    pub scaler: NormalizationParams,
    pub last_training_time: DateTime<Utc>,
    #[serde(default)]
    pub training_samples: usize,
    #[serde(default)]
    pub anomaly_rate: f64,
}

impl From<&CommittedModel> for ModelRecord {
    fn from(model: &CommittedModel) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            device_id: model.device_id.clone(),
            model: model.params.clone(),
            scaler: model.scaler.clone(),
            last_training_time: model.trained_at,
            training_samples: model.training_samples,
            anomaly_rate: model.anomaly_rate,
        }
    }
}

impl From<ModelRecord> for CommittedModel {
    fn from(record: ModelRecord) -> Self {
        Self {
            device_id: record.device_id,
            params: record.model,
            scaler: record.scaler,
            trained_at: record.last_training_time,
            training_samples: record.training_samples,
            anomaly_rate: record.anomaly_rate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "model.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Atomically replace the committed model on disk. A record that
    /// `load` would reject is never written.
    pub fn save(&self, model: &CommittedModel) -> Result<(), ModelStoreError> {
        let record = ModelRecord::from(model);
        validate_record(&record)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(&record)?;

        let tmp = self.temp_path();
        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::info!("Model saved to {}", self.path.display());
        Ok(())
    }

    /// `Ok(None)` when no model has been committed yet
    pub fn load(&self) -> Result<Option<CommittedModel>, ModelStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read(&self.path)?;
        let record: ModelRecord = serde_json::from_slice(&data)?;
        validate_record(&record)?;

        Ok(Some(record.into()))
    }
}
