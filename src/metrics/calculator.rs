//! Core per-activity metric calculations.
//!
//! Pure functions over aligned 1 Hz sample arrays: weighted (normalized)
//! power, linked power/heart-rate interval bests, max climb rate and
//! aerobic decoupling. No state, no I/O.
//!
//! Recorded streams may be absent, short, or of mismatched length. Every
//! function treats "not enough samples" as a defined zero/None result,
//! never a panic.

use std::collections::BTreeMap;

use super::curve::{best_window, prefix_sums};

/// Smoothing window for weighted power (30 s at 1 Hz).
const SMOOTHING_WINDOW: usize = 30;

/// Sliding window for climb-rate extraction (5 min at 1 Hz).
const VAM_WINDOW: usize = 300;

/// Minimum aligned samples for aerobic decoupling (10 min at 1 Hz).
const DECOUPLING_MIN_SAMPLES: usize = 600;

/// Peak effort at one duration: best rounded mean power, and the mean heart
/// rate over the exact same index window when the heart-rate series covers
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakEffort {
    /// Best mean power over the window, rounded to whole watts.
    pub power: u16,
    /// Mean heart rate over the identical window, if recorded.
    pub mean_hr: Option<u16>,
}

/// Weighted average power (normalized-power style).
///
/// Smooths with a 30-sample moving average, raises each smoothed value to
/// the 4th power, averages and takes the 4th root, truncated to whole
/// watts. Penalizes variable efforts relative to the plain mean. Returns 0
/// with fewer than 30 samples.
pub fn weighted_power(watts: &[u16]) -> u16 {
    if watts.len() < SMOOTHING_WINDOW {
        return 0;
    }

    let prefix = prefix_sums(watts);
    let windows = watts.len() - SMOOTHING_WINDOW + 1;

    let mut acc = 0.0f64;
    for start in 0..windows {
        let sum = prefix[start + SMOOTHING_WINDOW] - prefix[start];
        let avg = sum as f64 / SMOOTHING_WINDOW as f64;
        acc += avg.powi(4);
    }

    (acc / windows as f64).powf(0.25) as u16
}

/// Peak power and linked heart rate at each requested duration.
///
/// For every duration the recording is long enough for, locates the window
/// with the highest mean power and reports that power together with the
/// mean heart rate over the *same* index window. The heart rate is None
/// when the heart-rate series does not cover the located window; durations
/// with insufficient samples are absent from the map entirely.
pub fn interval_bests(
    watts: &[u16],
    heartrate: &[u16],
    durations: &[u32],
) -> BTreeMap<u32, PeakEffort> {
    let mut bests = BTreeMap::new();
    if watts.is_empty() {
        return bests;
    }

    let power_prefix = prefix_sums(watts);
    let hr_prefix = prefix_sums(heartrate);

    for &duration in durations {
        let window = duration as usize;
        let Some((start, sum)) = best_window(&power_prefix, window) else {
            continue;
        };

        let power = (sum as f64 / window as f64).round() as u16;

        // Heart rate must come from the identical window the peak power
        // was found in, not from its own best window.
        let mean_hr = if heartrate.len() >= start + window {
            let hr_sum = hr_prefix[start + window] - hr_prefix[start];
            Some((hr_sum as f64 / window as f64).round() as u16)
        } else {
            None
        };

        bests.insert(duration, PeakEffort { power, mean_hr });
    }

    bests
}

/// Maximum climb rate (VAM) in vertical meters per hour.
///
/// Elevation gain over a 5-minute sliding window, scaled to an hourly
/// rate. Returns 0 when the recording yields no complete window.
pub fn max_vam(altitude: &[f64]) -> i32 {
    if altitude.len() <= VAM_WINDOW {
        return 0;
    }

    let mut max_gain = f64::NEG_INFINITY;
    for i in VAM_WINDOW..altitude.len() {
        let gain = altitude[i] - altitude[i - VAM_WINDOW];
        if gain > max_gain {
            max_gain = gain;
        }
    }

    // 5-minute gain to hourly rate
    (max_gain * 12.0) as i32
}

/// Aerobic decoupling: percentage drop in efficiency factor between the
/// first and second half of the activity.
///
/// Values above ~5% suggest aerobic fatigue. None with fewer than 10
/// minutes of aligned power + heart-rate samples; 0.0 when the first-half
/// efficiency factor is zero.
pub fn aerobic_decoupling(watts: &[u16], heartrate: &[u16]) -> Option<f64> {
    let aligned = watts.len().min(heartrate.len());
    if aligned < DECOUPLING_MIN_SAMPLES {
        return None;
    }

    let mid = aligned / 2;

    let ef = |w: &[u16], hr: &[u16]| -> f64 {
        let avg_hr = mean(hr);
        if avg_hr > 0.0 {
            mean(w) / avg_hr
        } else {
            0.0
        }
    };

    let ef1 = ef(&watts[..mid], &heartrate[..mid]);
    let ef2 = ef(&watts[mid..aligned], &heartrate[mid..aligned]);

    if ef1 == 0.0 {
        return Some(0.0);
    }

    Some(round2(((ef1 - ef2) / ef1) * 100.0))
}

/// Arithmetic mean of a sample array (0.0 when empty).
pub fn mean(samples: &[u16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples.iter().map(|&v| v as u64).sum();
    sum as f64 / samples.len() as f64
}

/// Round to 2 decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 1 decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1200 samples alternating 150 W / 250 W every other sample.
    fn alternating_watts() -> Vec<u16> {
        (0..1200)
            .map(|i| if i % 2 == 0 { 150u16 } else { 250u16 })
            .collect()
    }

    #[test]
    fn test_weighted_power_too_short() {
        let samples = vec![200u16; 10];
        assert_eq!(weighted_power(&samples), 0);
    }

    #[test]
    fn test_weighted_power_constant() {
        let samples = vec![200u16; 600];
        assert_eq!(weighted_power(&samples), 200);
    }

    #[test]
    fn test_weighted_power_penalizes_variability() {
        let watts = alternating_watts();
        let wp = weighted_power(&watts);

        // Mean is 200 W; the 4th-power weighting must land strictly between
        // the low and high plateau.
        assert!(wp > 150 && wp < 250, "weighted power was {}", wp);
        assert!(wp >= 200);
    }

    #[test]
    fn test_weighted_power_deterministic() {
        let watts = alternating_watts();
        assert_eq!(weighted_power(&watts), weighted_power(&watts));
    }

    #[test]
    fn test_interval_bests_insufficient_samples() {
        let watts = vec![300u16; 10];
        let hr = vec![150u16; 10];
        let bests = interval_bests(&watts, &hr, &[5, 60]);

        assert_eq!(bests[&5].power, 300);
        assert!(!bests.contains_key(&60));
    }

    #[test]
    fn test_interval_bests_window_alignment() {
        // Peak power lives in samples 60..120; HR there is elevated.
        let mut watts = vec![100u16; 60];
        watts.extend(vec![400u16; 60]);
        watts.extend(vec![100u16; 60]);

        let mut hr = vec![120u16; 60];
        hr.extend(vec![180u16; 60]);
        hr.extend(vec![130u16; 60]);

        let bests = interval_bests(&watts, &hr, &[60]);
        let best = &bests[&60];
        assert_eq!(best.power, 400);
        // HR must be read from the power peak's window, not HR's own peak.
        assert_eq!(best.mean_hr, Some(180));
    }

    #[test]
    fn test_interval_bests_hr_not_covering_window() {
        let mut watts = vec![100u16; 100];
        watts.extend(vec![400u16; 60]);
        let hr = vec![150u16; 50]; // ends before the peak window

        let bests = interval_bests(&watts, &hr, &[60]);
        assert_eq!(bests[&60].power, 400);
        assert_eq!(bests[&60].mean_hr, None);
    }

    #[test]
    fn test_interval_bests_deterministic() {
        let watts = alternating_watts();
        let hr = vec![140u16; 1200];
        let a = interval_bests(&watts, &hr, &[5, 60, 300]);
        let b = interval_bests(&watts, &hr, &[5, 60, 300]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_vam_too_short() {
        let altitude = vec![500.0; 200];
        assert_eq!(max_vam(&altitude), 0);
    }

    #[test]
    fn test_max_vam_steady_climb() {
        // 0.5 m/s climb: 150 m per 5-minute window -> 1800 m/h.
        let altitude: Vec<f64> = (0..900).map(|i| i as f64 * 0.5).collect();
        assert_eq!(max_vam(&altitude), 1800);
    }

    #[test]
    fn test_max_vam_descent_is_negative() {
        let altitude: Vec<f64> = (0..900).map(|i| 1000.0 - i as f64 * 0.5).collect();
        assert!(max_vam(&altitude) < 0);
    }

    #[test]
    fn test_decoupling_insufficient_samples() {
        let watts = vec![200u16; 400];
        let hr = vec![140u16; 400];
        assert_eq!(aerobic_decoupling(&watts, &hr), None);
    }

    #[test]
    fn test_decoupling_even_effort_is_zero() {
        // Alternating power splits into identical halves, flat HR: both
        // efficiency factors are equal.
        let watts = alternating_watts();
        let hr = vec![140u16; 1200];
        assert_eq!(aerobic_decoupling(&watts, &hr), Some(0.0));
    }

    #[test]
    fn test_decoupling_detects_hr_drift() {
        let watts = vec![200u16; 1200];
        let mut hr = vec![140u16; 600];
        hr.extend(vec![154u16; 600]); // +10% HR in the second half

        let decoupling = aerobic_decoupling(&watts, &hr).expect("enough samples");
        assert!(decoupling > 8.0 && decoupling < 10.0);
    }

    #[test]
    fn test_decoupling_zero_hr() {
        let watts = vec![0u16; 1200];
        let hr = vec![0u16; 1200];
        assert_eq!(aerobic_decoupling(&watts, &hr), Some(0.0));
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
    }
}
