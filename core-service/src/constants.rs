//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every value here can be overridden through the environment, see `logic::config`.

/// Default device trained by the scheduler
pub const DEFAULT_DEVICE_ID: &str = "PM_001";

/// Most recent valid readings used for one training run
pub const DEFAULT_TRAINING_WINDOW: usize = 2500;

/// Training is refused below this many valid readings
pub const DEFAULT_MIN_TRAINING_SAMPLES: usize = 100;

/// Readings kept per device after a successful retrain
pub const DEFAULT_RETAIN_AFTER_PRUNE: usize = 500;

/// Retraining period (seconds)
pub const DEFAULT_RETRAIN_INTERVAL_SECS: u64 = 5 * 60;

/// Delay before the first training run after start (seconds)
pub const DEFAULT_INITIAL_TRAINING_DELAY_SECS: u64 = 30;

/// Upper bound for a single worker subprocess (seconds)
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 30;

/// Data directory name under the platform local-data dir
pub const APP_DIR_NAME: &str = "predictive-health";

/// Persisted model file name
pub const MODEL_FILE_NAME: &str = "ml_model.json";

/// Sensor log database file name
pub const FEATURE_DB_FILE_NAME: &str = "sensor_logs.sqlite3";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Predictive Health";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Read a parsed value from the environment or use the default
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a string from the environment, treating blank values as unset
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
