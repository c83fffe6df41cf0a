//! Model Module - Inference Engine and Model Store
//!
//! Prediction and health derivation are split from persistence and from
//! the modeling worker, so either arm can change without touching the other.

pub mod health;
pub mod inference;
pub mod storage;
pub mod types;
pub mod validate;


// Re-export common types
pub use inference::{EngineStats, HealthEngine, TrainError, TrainOutcome, TrainingSettings, TrainingState};
pub use storage::{ModelRecord, ModelStore, MODEL_FORMAT_VERSION};
pub use types::{
    CommittedModel, ModelParameters, ModelStatus, NormalizationParams, PredictionMethod,
    PredictionResult, Status, Verdict,
};
pub use validate::ModelStoreError;
