//! API Module
//!
//! Structure:
//! - commands.rs: command handlers over a shared `AppState`
//! - engine_status.rs: aggregated status payload

pub mod commands;
pub mod engine_status;

#[cfg(test)]
mod tests;

// Re-export current version as default
pub use commands::*;
