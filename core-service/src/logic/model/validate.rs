use super::storage::{ModelRecord, MODEL_FORMAT_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum ModelStoreError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization Error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Model format mismatch: expected v{expected}, got v{actual}")]
    FormatMismatch { expected: u32, actual: u32 },

    #[error("Invalid model record: {0}")]
    Invalid(String),
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Reject records a prediction must never read
pub fn validate_record(record: &ModelRecord) -> Result<(), ModelStoreError> {
    if record.format_version != MODEL_FORMAT_VERSION {
        return Err(ModelStoreError::FormatMismatch {
            expected: MODEL_FORMAT_VERSION,
            actual: record.format_version,
        });
    }

    let model = &record.model;
    if !model.contamination.is_finite() || !model.anomaly_threshold.is_finite() {
        return Err(ModelStoreError::Invalid("non-finite model parameter".to_string()));
    }
    if !all_finite(&model.feature_means) || !all_finite(&model.feature_stds) {
        return Err(ModelStoreError::Invalid("non-finite feature statistics".to_string()));
    }

    let scaler = &record.scaler;
    if !all_finite(&scaler.mean) || !all_finite(&scaler.std) {
        return Err(ModelStoreError::Invalid("non-finite scaler".to_string()));
    }
    if scaler.std.iter().any(|s| *s < 0.0) {
        return Err(ModelStoreError::Invalid("negative scaler std".to_string()));
    }

    if record.device_id.trim().is_empty() {
        return Err(ModelStoreError::Invalid("missing device id".to_string()));
    }

    Ok(())
}
