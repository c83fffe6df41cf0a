use serde::{Deserialize, Serialize};

use crate::logic::model::{EngineStats, ModelStatus};
use crate::logic::scheduler::SchedulerStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub version: String,
    pub feature_layout: Vec<String>,
    pub feature_count: usize,

    pub model: ModelStatus,
    pub engine: EngineStats,
    pub scheduler: SchedulerStatus,
    pub store: StoreStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub device_id: String,
    pub stored_readings: usize,
    pub training_window: usize,
    pub min_training_samples: usize,
}
