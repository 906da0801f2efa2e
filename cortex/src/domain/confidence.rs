// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Confidence model for playbook bullets.
//!
//! Confidence is derived from the helpful/harmful counters and never stored,
//! so it cannot drift from the counters it summarises.

/// Score returned when a bullet has no feedback yet.
pub const NEUTRAL_PRIOR: f64 = 0.5;

/// Map usage counters to a trust score in `[0, 1]`.
///
/// With no evidence the bullet sits at [`NEUTRAL_PRIOR`], neither promoted nor
/// suppressed.
pub fn confidence(helpful: u64, harmful: u64) -> f64 {
    let total = helpful.saturating_add(harmful);
    if total == 0 {
        return NEUTRAL_PRIOR;
    }
    helpful as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_counters_is_neutral() {
        assert_eq!(confidence(0, 0), 0.5);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(confidence(5, 0), 1.0);
        assert_eq!(confidence(0, 3), 0.0);
        assert_eq!(confidence(3, 1), 0.75);
    }

    #[test]
    fn test_always_in_unit_interval() {
        for helpful in 0..20u64 {
            for harmful in 0..20u64 {
                let score = confidence(helpful, harmful);
                assert!((0.0..=1.0).contains(&score), "{helpful}/{harmful} -> {score}");
            }
        }
        let score = confidence(u64::MAX, u64::MAX);
        assert!((0.0..=1.0).contains(&score));
    }
}
