//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the model feature schema.**
//!
//! The order of `FEATURE_LAYOUT` is the order of every normalization array,
//! every persisted `feature_means`/`feature_stds` entry and every worker row.

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Model features in exact vector order
pub const FEATURE_LAYOUT: &[&str] = &[
    "temp_mean",    // 0: Mean motor temperature (°C)
    "vib_rms",      // 1: RMS vibration (mm/s)
    "current_rms",  // 2: RMS phase current (A)
];

/// Total number of model features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 3;

pub const TEMP_MEAN: usize = 0;
pub const VIB_RMS: usize = 1;
pub const CURRENT_RMS: usize = 2;

// ============================================================================
// SEVERITY THRESHOLDS
// ============================================================================

/// Warning band: readings above these degrade health and status
pub const WARN_THRESHOLDS: [f64; FEATURE_COUNT] = [60.0, 2.0, 4.0];

/// Critical band: readings above these are anomalous on the fallback path
pub const CRITICAL_THRESHOLDS: [f64; FEATURE_COUNT] = [70.0, 3.0, 6.0];

/// True if any feature is strictly above its threshold
pub fn any_above(values: &[f64; FEATURE_COUNT], thresholds: &[f64; FEATURE_COUNT]) -> bool {
    values.iter().zip(thresholds.iter()).any(|(v, t)| v > t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_count_matches() {
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_index_constants_match_layout() {
        assert_eq!(FEATURE_LAYOUT[TEMP_MEAN], "temp_mean");
        assert_eq!(FEATURE_LAYOUT[VIB_RMS], "vib_rms");
        assert_eq!(FEATURE_LAYOUT[CURRENT_RMS], "current_rms");
    }

    #[test]
    fn test_any_above_is_strict() {
        assert!(!any_above(&[60.0, 2.0, 4.0], &WARN_THRESHOLDS));
        assert!(any_above(&[60.1, 0.0, 0.0], &WARN_THRESHOLDS));
        assert!(any_above(&[0.0, 0.0, 6.5], &CRITICAL_THRESHOLDS));
    }
}
