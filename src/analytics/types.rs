//! Domain types for activity analytics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity kinds eligible for power analytics.
pub const ANALYTICS_KINDS: &[&str] = &["Ride", "VirtualRide"];

/// Activity summary. Owned by the ingestion side; read-only here apart
/// from the recalculation flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Provider-assigned activity id.
    pub id: i64,
    /// Provider-assigned athlete id.
    pub athlete_id: i64,
    /// Display name.
    pub name: Option<String>,
    /// Activity kind ("Ride", "VirtualRide", "Run", ...).
    pub kind: String,
    /// Start timestamp; the causally ordered key for all baseline logic.
    pub start_date: DateTime<Utc>,
    /// Set by the invalidation cascade, cleared by the scheduler.
    pub needs_recalculation: bool,
}

impl Activity {
    /// Whether this activity kind gets power analytics.
    pub fn is_analytics_kind(&self) -> bool {
        ANALYTICS_KINDS.contains(&self.kind.as_str())
    }
}

/// Aligned per-activity sample arrays, 1 Hz. Series the device did not
/// record deserialize to empty vectors; lengths may disagree and consumers
/// must treat any mismatch as insufficient data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSet {
    #[serde(default)]
    pub time: Vec<u32>,
    #[serde(default)]
    pub watts: Vec<u16>,
    #[serde(default)]
    pub heartrate: Vec<u16>,
    #[serde(default)]
    pub cadence: Vec<u16>,
    #[serde(default)]
    pub altitude: Vec<f64>,
    #[serde(default)]
    pub temp: Vec<f64>,
}

/// The fixed peak windows reported on every analytics record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakWindow {
    FiveSeconds,
    OneMinute,
    FiveMinutes,
    TwentyMinutes,
}

impl PeakWindow {
    pub const ALL: [PeakWindow; 4] = [
        PeakWindow::FiveSeconds,
        PeakWindow::OneMinute,
        PeakWindow::FiveMinutes,
        PeakWindow::TwentyMinutes,
    ];

    /// Window length in seconds.
    pub fn seconds(self) -> u32 {
        match self {
            PeakWindow::FiveSeconds => 5,
            PeakWindow::OneMinute => 60,
            PeakWindow::FiveMinutes => 300,
            PeakWindow::TwentyMinutes => 1200,
        }
    }

    /// Short label used in persisted column names and chart APIs.
    pub fn label(self) -> &'static str {
        match self {
            PeakWindow::FiveSeconds => "5s",
            PeakWindow::OneMinute => "1m",
            PeakWindow::FiveMinutes => "5m",
            PeakWindow::TwentyMinutes => "20m",
        }
    }

    /// Parse a label like "20m" back into a window.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "5s" => Some(PeakWindow::FiveSeconds),
            "1m" => Some(PeakWindow::OneMinute),
            "5m" => Some(PeakWindow::FiveMinutes),
            "20m" => Some(PeakWindow::TwentyMinutes),
            _ => None,
        }
    }
}

/// Derived analytics for one activity. Created and overwritten only by the
/// processor; the persisted row is the durable contract reporting surfaces
/// read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub activity_id: i64,

    // Peak power at the fixed windows; absent when the ride was shorter
    // than the window.
    pub peak_power_5s: Option<u16>,
    pub peak_power_1m: Option<u16>,
    pub peak_power_5m: Option<u16>,
    pub peak_power_20m: Option<u16>,

    // Mean heart rate over the exact window each power peak was set in.
    pub peak_hr_5s: Option<u16>,
    pub peak_hr_1m: Option<u16>,
    pub peak_hr_5m: Option<u16>,
    pub peak_hr_20m: Option<u16>,

    /// Weighted (normalized) average power.
    pub weighted_power: u16,
    /// This ride's own FTP estimate (95% of the 20-minute peak).
    pub ride_ftp: Option<u16>,
    /// The FTP that was in force when this ride was scored. A snapshot,
    /// never a live reference to the athlete baseline.
    pub baseline_ftp: u16,
    /// Highest heart-rate sample of the ride.
    pub max_heartrate: Option<u16>,
    /// Best 5-minute climb rate, vertical meters per hour.
    pub max_vam: i32,
    /// First-half vs second-half efficiency drop, percent.
    pub aerobic_decoupling: Option<f64>,
    /// Weighted power / mean power.
    pub variability_index: f64,
    /// Weighted power / mean heart rate.
    pub efficiency_factor: f64,
    /// Weighted power / baseline FTP.
    pub intensity_score: f64,
    /// Training stress score for the ride.
    pub training_stress_score: f64,
    /// Ride duration in seconds (power samples at 1 Hz).
    pub duration_seconds: u32,
    /// Best mean power per achieved duration, seconds -> watts.
    pub power_curve: BTreeMap<u32, u16>,
}

impl AnalyticsRecord {
    /// Peak power for one of the fixed windows.
    pub fn peak_power(&self, window: PeakWindow) -> Option<u16> {
        match window {
            PeakWindow::FiveSeconds => self.peak_power_5s,
            PeakWindow::OneMinute => self.peak_power_1m,
            PeakWindow::FiveMinutes => self.peak_power_5m,
            PeakWindow::TwentyMinutes => self.peak_power_20m,
        }
    }
}

/// Per-athlete baseline state. Long-lived and mutable, but reconstructible
/// "as of" any historical date through the resolver.
///
/// `detected_ftp_at` is always the start date of the activity whose
/// processing produced the current `detected_ftp` (None when never
/// detected); it anchors every causal priority decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AthleteBaseline {
    /// Athlete-entered FTP override.
    pub manual_ftp: Option<u16>,
    /// Date the manual FTP applies from; None means "always".
    pub manual_ftp_effective_at: Option<DateTime<Utc>>,
    /// Athlete-entered max heart rate.
    pub manual_max_hr: Option<u16>,

    /// System-detected FTP.
    pub detected_ftp: Option<u16>,
    /// Activity whose processing set `detected_ftp`.
    pub detected_ftp_source_activity: Option<i64>,
    /// Start date of that activity.
    pub detected_ftp_at: Option<DateTime<Utc>>,

    /// System-detected max heart rate.
    pub detected_max_hr: Option<u16>,
    /// Start date of the activity whose processing set it.
    pub detected_max_hr_at: Option<DateTime<Utc>>,
}
