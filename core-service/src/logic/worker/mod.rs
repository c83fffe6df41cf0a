//! Modeling Worker - the statistical routine behind a narrow contract
//!
//! The engine never runs the anomaly algorithm itself. It hands normalized
//! features (or raw training rows) to a `ModelingWorker` and treats any
//! error as a worker failure.
//!
//! # Implementations
//! - `ProcessWorker`: out-of-process, JSON request/response files
//! - `StatisticalWorker`: in-process z-score detector with the same contract

pub mod protocol;
pub mod process;
pub mod statistical;


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::logic::config::{EngineConfig, WorkerKind};

pub use process::ProcessWorker;
pub use protocol::{
    NormalizedFeatures, PredictionRequest, PredictionResponse, TrainingResponse, TrainingRow,
};
pub use statistical::StatisticalWorker;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("worker command is empty")]
    EmptyCommand,

    #[error("failed to spawn worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker timed out after {0:?}")]
    Timeout(Duration),

    #[error("worker exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("worker IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed worker output: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid worker output: {0}")]
    Invalid(String),
}

/// Training and single-reading inference
#[async_trait]
pub trait ModelingWorker: Send + Sync {
    /// Fit on raw feature rows, returning the model parameters
    async fn train_batch(&self, rows: &[TrainingRow]) -> Result<TrainingResponse, WorkerError>;

    /// Score one normalized reading against committed parameters
    async fn predict_one(&self, request: &PredictionRequest) -> Result<PredictionResponse, WorkerError>;

    fn name(&self) -> &'static str;
}

/// Build the worker selected by configuration
pub fn from_config(config: &EngineConfig) -> Arc<dyn ModelingWorker> {
    match config.worker {
        WorkerKind::Process => Arc::new(ProcessWorker::from_config(config)),
        WorkerKind::Builtin => Arc::new(StatisticalWorker::new(config.min_training_samples)),
    }
}
