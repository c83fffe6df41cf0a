//! Logic Module - Engines & Stores
//!
//! - `features/` - Sensor feature layout and readings
//! - `feature_store/` - Historical readings (SQLite)
//! - `worker/` - Modeling worker contract and implementations
//! - `model/` - Inference engine, health derivation, model store
//! - `scheduler/` - Periodic retraining

pub mod config;

pub mod feature_store;
pub mod features;
pub mod model;
pub mod scheduler;
pub mod worker;
