//! Metric primitives for activity analysis.

pub mod calculator;
pub mod curve;

pub use calculator::{
    aerobic_decoupling, interval_bests, max_vam, mean, weighted_power, PeakEffort,
};
pub use curve::{power_curve, CURVE_DURATIONS};
