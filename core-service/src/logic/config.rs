//! Engine Configuration
//!
//! Built from environment variables with defaults from `constants`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{self, env_or, env_string};

/// Which modeling worker the engine talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Out-of-process worker over the file protocol
    Process,
    /// In-process statistical worker
    Builtin,
}

impl std::str::FromStr for WorkerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" => Ok(WorkerKind::Process),
            "builtin" => Ok(WorkerKind::Builtin),
            other => Err(format!("unknown worker kind: {}", other)),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base directory for model and sensor data
    pub data_dir: PathBuf,
    /// Committed model file
    pub model_path: PathBuf,
    /// SQLite sensor log database
    pub feature_db_path: PathBuf,
    /// Device trained by the scheduler
    pub device_id: String,
    /// Readings per training window
    pub training_window: usize,
    /// Minimum valid readings to train
    pub min_training_samples: usize,
    /// Readings kept after pruning
    pub retain_after_prune: usize,
    /// Retraining period in seconds
    pub retrain_interval_secs: u64,
    /// First training delay in seconds
    pub initial_training_delay_secs: u64,
    /// Worker implementation
    pub worker: WorkerKind,
    /// Training worker argv (input/output paths are appended)
    pub worker_train_cmd: Vec<String>,
    /// Prediction worker argv (input/output paths are appended)
    pub worker_predict_cmd: Vec<String>,
    /// Per-invocation worker timeout in seconds
    pub worker_timeout_secs: u64,
    /// Directory for worker request/response files
    pub worker_tmp_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let data_dir = env_string("HEALTH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Self {
            model_path: env_string("HEALTH_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_model_path(&data_dir)),
            feature_db_path: env_string("HEALTH_FEATURE_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_feature_db_path(&data_dir)),
            device_id: env_string("HEALTH_DEVICE_ID")
                .unwrap_or_else(|| constants::DEFAULT_DEVICE_ID.to_string()),
            training_window: env_or("HEALTH_TRAINING_WINDOW", constants::DEFAULT_TRAINING_WINDOW),
            min_training_samples: env_or(
                "HEALTH_MIN_TRAINING_SAMPLES",
                constants::DEFAULT_MIN_TRAINING_SAMPLES,
            ),
            retain_after_prune: env_or(
                "HEALTH_RETAIN_AFTER_PRUNE",
                constants::DEFAULT_RETAIN_AFTER_PRUNE,
            ),
            retrain_interval_secs: env_or(
                "HEALTH_RETRAIN_INTERVAL_SECS",
                constants::DEFAULT_RETRAIN_INTERVAL_SECS,
            ),
            initial_training_delay_secs: env_or(
                "HEALTH_INITIAL_TRAINING_DELAY_SECS",
                constants::DEFAULT_INITIAL_TRAINING_DELAY_SECS,
            ),
            worker: env_or("HEALTH_WORKER", WorkerKind::Process),
            worker_train_cmd: env_string("HEALTH_WORKER_TRAIN_CMD")
                .map(|s| split_argv(&s))
                .unwrap_or_else(|| self_worker_cmd("train")),
            worker_predict_cmd: env_string("HEALTH_WORKER_PREDICT_CMD")
                .map(|s| split_argv(&s))
                .unwrap_or_else(|| self_worker_cmd("predict")),
            worker_timeout_secs: env_or(
                "HEALTH_WORKER_TIMEOUT_SECS",
                constants::DEFAULT_WORKER_TIMEOUT_SECS,
            ),
            worker_tmp_dir: env_string("HEALTH_WORKER_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            data_dir,
        }
    }

    /// Re-root the data directory (used by tests and `--data-dir`).
    /// Paths set explicitly via `HEALTH_MODEL_PATH`/`HEALTH_FEATURE_DB`
    /// stay where they are; only the derived defaults move.
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        if self.model_path == default_model_path(&self.data_dir) {
            self.model_path = default_model_path(&data_dir);
        }
        if self.feature_db_path == default_feature_db_path(&self.data_dir) {
            self.feature_db_path = default_feature_db_path(&data_dir);
        }
        self.data_dir = data_dir;
        self
    }

    pub fn retrain_interval(&self) -> Duration {
        Duration::from_secs(self.retrain_interval_secs)
    }

    pub fn initial_training_delay(&self) -> Duration {
        Duration::from_secs(self.initial_training_delay_secs)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(constants::APP_DIR_NAME)
}

fn default_model_path(data_dir: &Path) -> PathBuf {
    data_dir.join("models").join(constants::MODEL_FILE_NAME)
}

fn default_feature_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(constants::FEATURE_DB_FILE_NAME)
}

fn split_argv(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Re-invoke this executable's `worker <mode>` subcommand
fn self_worker_cmd(mode: &str) -> Vec<String> {
    let exe = std::env::current_exe()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "predictive-health-core".to_string());
    vec![exe, "worker".to_string(), mode.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_kind_parse() {
        assert_eq!("process".parse::<WorkerKind>(), Ok(WorkerKind::Process));
        assert_eq!("BUILTIN".parse::<WorkerKind>(), Ok(WorkerKind::Builtin));
        assert!("python".parse::<WorkerKind>().is_err());
    }

    #[test]
    fn test_with_data_dir_moves_paths() {
        let config = EngineConfig::from_env().with_data_dir(PathBuf::from("/tmp/ph-test"));
        assert_eq!(config.model_path, PathBuf::from("/tmp/ph-test/models/ml_model.json"));
        assert_eq!(config.feature_db_path, PathBuf::from("/tmp/ph-test/sensor_logs.sqlite3"));
    }

    #[test]
    fn test_with_data_dir_keeps_explicit_paths() {
        let mut config = EngineConfig::from_env().with_data_dir(PathBuf::from("/tmp/ph-a"));
        config.model_path = PathBuf::from("/srv/health/custom_model.json");

        let config = config.with_data_dir(PathBuf::from("/tmp/ph-b"));
        assert_eq!(config.model_path, PathBuf::from("/srv/health/custom_model.json"));
        assert_eq!(config.feature_db_path, PathBuf::from("/tmp/ph-b/sensor_logs.sqlite3"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ph-b"));
    }

    #[test]
    fn test_split_argv() {
        assert_eq!(
            split_argv("python3  ml_train.py"),
            vec!["python3".to_string(), "ml_train.py".to_string()]
        );
    }

    #[test]
    fn test_default_worker_cmd_targets_worker_subcommand() {
        let cmd = self_worker_cmd("train");
        assert_eq!(cmd.len(), 3);
        assert_eq!(cmd[1], "worker");
        assert_eq!(cmd[2], "train");
    }
}
