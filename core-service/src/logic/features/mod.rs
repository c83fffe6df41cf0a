//! Features Module - Sensor Feature Schema
//!
//! Feature layout, severity thresholds and the reading types shared by
//! the feature store, the inference engine and the modeling worker.

pub mod layout;
pub mod vector;


// Re-export common types
pub use layout::{FEATURE_COUNT, FEATURE_LAYOUT};
pub use vector::{SensorFeatures, SensorReading};
