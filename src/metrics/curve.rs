//! Best-effort (mean-maximal power) extraction.
//!
//! Shared low-level machinery for locating the window with the highest mean
//! power at a given duration. Used by the interval-best calculations and by
//! the per-activity power-duration curve.

use std::collections::BTreeMap;

/// Durations (seconds) sampled for the per-activity power-duration curve.
pub const CURVE_DURATIONS: &[u32] = &[
    1, 2, 5, 10, 30, 60, 120, 300, 600, 900, 1200, 1800, 3600,
];

/// Prefix sums over a sample array, for O(1) window sums.
pub(crate) fn prefix_sums(samples: &[u16]) -> Vec<u64> {
    let mut prefix = vec![0u64; samples.len() + 1];
    for (i, &value) in samples.iter().enumerate() {
        prefix[i + 1] = prefix[i] + value as u64;
    }
    prefix
}

/// Find the start index and sample sum of the best window of `window_len`
/// samples. Returns None when the series is shorter than the window.
pub(crate) fn best_window(prefix: &[u64], window_len: usize) -> Option<(usize, u64)> {
    let n = prefix.len() - 1;
    if window_len == 0 || window_len > n {
        return None;
    }

    let mut best_start = 0usize;
    let mut best_sum = 0u64;
    for end in window_len..=n {
        let start = end - window_len;
        let sum = prefix[end] - prefix[start];
        if sum > best_sum {
            best_sum = sum;
            best_start = start;
        }
    }

    Some((best_start, best_sum))
}

/// Calculate the best mean power at each achieved duration.
///
/// Samples are assumed to be 1 Hz. Durations longer than the recording are
/// skipped, so the returned map only contains durations the ride actually
/// achieved.
pub fn power_curve(watts: &[u16], durations: &[u32]) -> BTreeMap<u32, u16> {
    let mut curve = BTreeMap::new();
    if watts.is_empty() {
        return curve;
    }

    let prefix = prefix_sums(watts);
    for &duration in durations {
        let window = duration as usize;
        if let Some((_, sum)) = best_window(&prefix, window) {
            let mean = (sum as f64 / window as f64).round() as u16;
            curve.insert(duration, mean);
        }
    }

    curve
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_constant_power() {
        let samples = vec![200u16; 600];
        let curve = power_curve(&samples, CURVE_DURATIONS);

        for (&duration, &power) in &curve {
            assert!(duration <= 600);
            assert_eq!(power, 200, "Duration: {}s", duration);
        }
        assert!(!curve.contains_key(&900));
        assert!(!curve.contains_key(&3600));
    }

    #[test]
    fn test_curve_finds_interval_effort() {
        // 5 min easy, 1 min hard, 5 min easy
        let mut samples = vec![150u16; 300];
        samples.extend(vec![400u16; 60]);
        samples.extend(vec![150u16; 300]);

        let curve = power_curve(&samples, &[60, 300]);
        assert_eq!(curve[&60], 400);
        assert!(curve[&300] > 150);
    }

    #[test]
    fn test_curve_empty_input() {
        let curve = power_curve(&[], CURVE_DURATIONS);
        assert!(curve.is_empty());
    }

    #[test]
    fn test_best_window_locates_peak() {
        let samples = vec![100, 100, 300, 300, 100];
        let prefix = prefix_sums(&samples);

        let (start, sum) = best_window(&prefix, 2).expect("window should exist");
        assert_eq!(start, 2);
        assert_eq!(sum, 600);
    }

    #[test]
    fn test_best_window_too_short() {
        let prefix = prefix_sums(&[100, 100]);
        assert!(best_window(&prefix, 3).is_none());
    }
}
