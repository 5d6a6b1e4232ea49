//! Point-in-time baseline resolution.
//!
//! Decides, for one activity, which FTP and max heart rate were in force
//! on that activity's date, and how the stored athlete baseline moves in
//! response. The resolver is a pure function of the current baseline
//! snapshot, the ride's own observation, and a read-only history view; the
//! caller persists the returned snapshot.
//!
//! The evaluation is an ordered decision table with one named outcome per
//! branch:
//!
//! 1. `TimeTravel`: the activity predates the stored detection, so the
//!    stored baseline was derived from data that is in this ride's future.
//!    The baseline is rebuilt from history ending before the ride.
//! 2. `ManualOverride`: an athlete-entered FTP whose effective date has
//!    passed is authoritative.
//! 3. `Redetected`: the baseline is missing, stale, or beaten by this
//!    ride; detection values move.
//! 4. `SteadyState`: the stored values already hold for this date.
//!
//! Ordering matters: a "latest known baseline" shortcut would silently
//! score backfilled rides against future fitness and corrupt every
//! training-stress number derived from them.

use chrono::{DateTime, Duration, Utc};

use crate::analytics::types::AthleteBaseline;
use crate::storage::config::AnalyticsSettings;
use crate::storage::DatabaseError;

/// What one ride contributes to baseline detection. Computed by the
/// processor from raw streams before resolution.
#[derive(Debug, Clone, Copy)]
pub struct RideObservation {
    pub activity_id: i64,
    pub start_date: DateTime<Utc>,
    /// 95% of the ride's 20-minute peak, when the ride was long enough.
    pub ftp_estimate: Option<u16>,
    /// Highest heart-rate sample of the ride.
    pub max_heartrate: Option<u16>,
}

/// One historical best pulled from persisted analytics.
#[derive(Debug, Clone, Copy)]
pub struct HistoricalBest {
    pub value: u16,
    pub activity_id: i64,
    pub start_date: DateTime<Utc>,
}

/// Date range for history queries.
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
    /// Whether `until` itself is part of the window.
    pub inclusive_end: bool,
    /// Activity to leave out (the one being processed).
    pub exclude_activity: Option<i64>,
}

impl HistoryWindow {
    /// Lookback window ending strictly before `anchor`; used for
    /// time-travel reconstruction.
    pub fn ending_before(anchor: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            from: anchor - lookback,
            until: anchor,
            inclusive_end: false,
            exclude_activity: None,
        }
    }

    /// Lookback window running up to and including `anchor`; used for
    /// graceful decay. The activity under processing is excluded so a
    /// reprocessing run never reads its own previous record.
    pub fn ending_at(anchor: DateTime<Utc>, lookback: Duration, exclude_activity: i64) -> Self {
        Self {
            from: anchor - lookback,
            until: anchor,
            inclusive_end: true,
            exclude_activity: Some(exclude_activity),
        }
    }
}

/// Read-only query capability over an athlete's persisted analytics.
pub trait BaselineHistory {
    /// Best per-ride FTP estimate within the window.
    fn best_ride_ftp(
        &self,
        athlete_id: i64,
        window: HistoryWindow,
    ) -> Result<Option<HistoricalBest>, DatabaseError>;

    /// Best per-ride max heart rate within the window.
    fn best_max_hr(
        &self,
        athlete_id: i64,
        window: HistoryWindow,
    ) -> Result<Option<HistoricalBest>, DatabaseError>;
}

/// Why a redetection fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedetectReason {
    /// No baseline existed yet.
    Missing,
    /// The stored detection aged out of the lookback window.
    Stale,
    /// This ride beat the stored value.
    NewPeak,
}

/// Named outcome of one resolver evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineOutcome {
    TimeTravel,
    ManualOverride,
    Redetected(RedetectReason),
    SteadyState,
}

/// Result of resolving a baseline for one activity.
#[derive(Debug)]
pub struct Resolution {
    /// FTP in force on the activity's date.
    pub ftp: u16,
    /// Max heart rate in force on the activity's date.
    pub max_hr: u16,
    /// Snapshot to persist (meaningful only when `changed`).
    pub baseline: AthleteBaseline,
    /// Whether the snapshot differs from the input.
    pub changed: bool,
    /// Which branch of the decision table fired.
    pub outcome: BaselineOutcome,
}

/// Point-in-time FTP / max-HR resolver.
pub struct BaselineResolver<'a> {
    history: &'a dyn BaselineHistory,
    settings: &'a AnalyticsSettings,
}

impl<'a> BaselineResolver<'a> {
    pub fn new(history: &'a dyn BaselineHistory, settings: &'a AnalyticsSettings) -> Self {
        Self { history, settings }
    }

    /// Evaluate the decision table for one activity.
    pub fn resolve(
        &self,
        athlete_id: i64,
        baseline: &AthleteBaseline,
        ride: &RideObservation,
    ) -> Result<Resolution, DatabaseError> {
        let lookback = Duration::days(self.settings.ftp_lookback_days);
        let mut working = baseline.clone();

        // Gate 1: time-travel correction. The stored detection is anchored
        // to the activity that produced it; anything dated before that
        // anchor must not see it.
        if let Some(detected_at) = working.detected_ftp_at {
            if ride.start_date < detected_at {
                let window = HistoryWindow::ending_before(ride.start_date, lookback);
                let ftp_hist = self.history.best_ride_ftp(athlete_id, window)?;
                let hr_hist = self.history.best_max_hr(athlete_id, window)?;

                if ftp_hist.is_some() || hr_hist.is_some() {
                    if let Some(hist) = ftp_hist {
                        working.detected_ftp = Some(hist.value);
                        working.detected_ftp_source_activity = Some(hist.activity_id);
                        working.detected_ftp_at = Some(hist.start_date);
                    } else {
                        working.detected_ftp = None;
                        working.detected_ftp_source_activity = None;
                        working.detected_ftp_at = None;
                    }
                    if let Some(hist) = hr_hist {
                        working.detected_max_hr = Some(hist.value);
                        working.detected_max_hr_at = Some(hist.start_date);
                    } else {
                        working.detected_max_hr = None;
                        working.detected_max_hr_at = None;
                    }

                    let resolution = Resolution {
                        ftp: working.detected_ftp.unwrap_or(self.settings.default_ftp),
                        max_hr: working
                            .detected_max_hr
                            .unwrap_or(self.settings.default_max_hr),
                        changed: working != *baseline,
                        baseline: working,
                        outcome: BaselineOutcome::TimeTravel,
                    };
                    tracing::debug!(
                        athlete_id,
                        activity_id = ride.activity_id,
                        ftp = resolution.ftp,
                        "baseline reconstructed as of activity date"
                    );
                    return Ok(resolution);
                }

                // Cold-start gap: a backfill landed before everything this
                // athlete has on record. Notable because the detection
                // walk restarts from here.
                tracing::warn!(
                    athlete_id,
                    activity_id = ride.activity_id,
                    "no analytics history before backfilled activity; baseline restarts"
                );
                working.detected_ftp = None;
                working.detected_ftp_source_activity = None;
                working.detected_ftp_at = None;
                working.detected_max_hr = None;
                working.detected_max_hr_at = None;
            }
        }

        // Gate 2: manual override in force. A missing effective date means
        // the override has always applied.
        if let Some(manual_ftp) = working.manual_ftp {
            let in_force = working
                .manual_ftp_effective_at
                .map_or(true, |at| at <= ride.start_date);

            if in_force {
                let max_hr = working
                    .manual_max_hr
                    .or(working.detected_max_hr)
                    .unwrap_or(self.settings.default_max_hr);

                return Ok(Resolution {
                    ftp: manual_ftp,
                    max_hr,
                    changed: working != *baseline,
                    baseline: working,
                    outcome: BaselineOutcome::ManualOverride,
                });
            }
        }

        // Gates 3/4: detection. FTP and max HR move independently, each
        // with its own staleness and peak test.
        let stale_cutoff = ride.start_date - lookback;

        let ftp_reason = self.redetect_ftp(athlete_id, &mut working, ride, stale_cutoff)?;
        let hr_reason = self.redetect_max_hr(athlete_id, &mut working, ride, stale_cutoff)?;

        let outcome = match ftp_reason.or(hr_reason) {
            Some(reason) => BaselineOutcome::Redetected(reason),
            None => BaselineOutcome::SteadyState,
        };

        Ok(Resolution {
            ftp: working.detected_ftp.unwrap_or(self.settings.default_ftp),
            max_hr: working
                .detected_max_hr
                .unwrap_or(self.settings.default_max_hr),
            changed: working != *baseline,
            baseline: working,
            outcome,
        })
    }

    /// FTP side of the detection gate. Returns the reason when the stored
    /// value moved.
    fn redetect_ftp(
        &self,
        athlete_id: i64,
        working: &mut AthleteBaseline,
        ride: &RideObservation,
        stale_cutoff: DateTime<Utc>,
    ) -> Result<Option<RedetectReason>, DatabaseError> {
        let missing = working.detected_ftp.is_none();
        let stale = working.detected_ftp_at.is_some_and(|at| at < stale_cutoff);
        let new_peak = match (ride.ftp_estimate, working.detected_ftp) {
            (Some(estimate), Some(current)) => estimate > current,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if !(missing || stale || new_peak) {
            return Ok(None);
        }

        let candidate = if new_peak {
            ride.ftp_estimate
        } else {
            // Graceful decay: relax toward the best of recent history
            // rather than jumping straight to this ride's value. The max
            // with the ride estimate makes this branch ratchet-up only.
            let lookback = Duration::days(self.settings.ftp_lookback_days);
            let window = HistoryWindow::ending_at(ride.start_date, lookback, ride.activity_id);
            let decayed = self
                .history
                .best_ride_ftp(athlete_id, window)?
                .map(|hist| hist.value);

            match (decayed, ride.ftp_estimate) {
                (Some(d), Some(e)) => Some(d.max(e)),
                (Some(d), None) => Some(d),
                (None, estimate) => estimate,
            }
        };

        let Some(value) = candidate else {
            // Nothing to detect from: no estimate, no history. Resolved
            // values fall back to defaults; the stored baseline is not
            // touched.
            return Ok(None);
        };

        working.detected_ftp = Some(value);
        working.detected_ftp_source_activity = Some(ride.activity_id);
        working.detected_ftp_at = Some(ride.start_date);

        let reason = if missing {
            RedetectReason::Missing
        } else if new_peak {
            RedetectReason::NewPeak
        } else {
            RedetectReason::Stale
        };

        tracing::debug!(
            athlete_id,
            activity_id = ride.activity_id,
            ftp = value,
            ?reason,
            "detected FTP updated"
        );

        Ok(Some(reason))
    }

    /// Max-HR side of the detection gate, mirroring the FTP logic.
    fn redetect_max_hr(
        &self,
        athlete_id: i64,
        working: &mut AthleteBaseline,
        ride: &RideObservation,
        stale_cutoff: DateTime<Utc>,
    ) -> Result<Option<RedetectReason>, DatabaseError> {
        let missing = working.detected_max_hr.is_none();
        let stale = working
            .detected_max_hr_at
            .is_some_and(|at| at < stale_cutoff);
        let new_peak = match (ride.max_heartrate, working.detected_max_hr) {
            (Some(observed), Some(current)) => observed > current,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if !(missing || stale || new_peak) {
            return Ok(None);
        }

        let candidate = if new_peak {
            ride.max_heartrate
        } else {
            let lookback = Duration::days(self.settings.ftp_lookback_days);
            let window = HistoryWindow::ending_at(ride.start_date, lookback, ride.activity_id);
            let decayed = self
                .history
                .best_max_hr(athlete_id, window)?
                .map(|hist| hist.value);

            match (decayed, ride.max_heartrate) {
                (Some(d), Some(o)) => Some(d.max(o)),
                (Some(d), None) => Some(d),
                (None, observed) => observed,
            }
        };

        let Some(value) = candidate else {
            return Ok(None);
        };

        working.detected_max_hr = Some(value);
        working.detected_max_hr_at = Some(ride.start_date);

        let reason = if missing {
            RedetectReason::Missing
        } else if new_peak {
            RedetectReason::NewPeak
        } else {
            RedetectReason::Stale
        };

        Ok(Some(reason))
    }
}
