//! Training load calculations (CTL/ATL/TSB).
//!
//! Implements the Performance Management Chart (PMC) model:
//! - CTL (Chronic Training Load): 42-day exponentially weighted moving average
//! - ATL (Acute Training Load): 7-day exponentially weighted moving average
//! - TSB (Training Stress Balance): CTL - ATL

use serde::{Deserialize, Serialize};

/// Daily training load values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyLoad {
    /// Total TSS for the day.
    pub tss: f64,
    /// Chronic Training Load (42-day EWMA).
    pub ctl: f64,
    /// Acute Training Load (7-day EWMA).
    pub atl: f64,
    /// Training Stress Balance (CTL - ATL).
    pub tsb: f64,
}

/// Training load calculator.
pub struct LoadCalculator {
    /// ATL decay constant (default: 7 days).
    atl_days: f64,
    /// CTL decay constant (default: 42 days).
    ctl_days: f64,
}

impl LoadCalculator {
    /// Create with default constants (7/42 day).
    pub fn new() -> Self {
        Self {
            atl_days: 7.0,
            ctl_days: 42.0,
        }
    }

    /// Calculate one day's load from the previous day's values and the
    /// day's total TSS.
    pub fn calculate_day(&self, prev: DailyLoad, today_tss: f64) -> DailyLoad {
        // EWMA formula: new = old × (1 - k) + value × k
        // where k = 2 / (N + 1)
        let atl_k = 2.0 / (self.atl_days + 1.0);
        let ctl_k = 2.0 / (self.ctl_days + 1.0);

        let atl = prev.atl * (1.0 - atl_k) + today_tss * atl_k;
        let ctl = prev.ctl * (1.0 - ctl_k) + today_tss * ctl_k;

        DailyLoad {
            tss: today_tss,
            ctl,
            atl,
            tsb: ctl - atl,
        }
    }
}

impl Default for LoadCalculator {
    fn default() -> Self {
        Self::new()
    }
}
