//! Per-activity analytics processing.
//!
//! Orchestrates one activity end to end: load streams, compute the core
//! metrics, resolve the baseline in force on the activity's date, derive
//! the normalized scores, and upsert the full analytics record in one
//! statement.

use crate::analytics::baseline::{BaselineResolver, RideObservation};
use crate::analytics::error::{AnalyticsError, AnalyticsResult};
use crate::analytics::types::{AnalyticsRecord, PeakWindow};
use crate::metrics::calculator::{round1, round2};
use crate::metrics::{
    aerobic_decoupling, interval_bests, max_vam, mean, power_curve, weighted_power, PeakEffort,
    CURVE_DURATIONS,
};
use crate::storage::config::AnalyticsSettings;
use crate::storage::{ActivityStore, AnalyticsStore, AthleteStore, Database, StreamStore};

/// Ride FTP estimate: 95% of the best 20-minute power.
const FTP_FROM_20MIN_FACTOR: f64 = 0.95;

/// Processor for a single activity's analytics.
pub struct ActivityAnalyticsProcessor<'a> {
    db: &'a Database,
    settings: &'a AnalyticsSettings,
}

impl<'a> ActivityAnalyticsProcessor<'a> {
    pub fn new(db: &'a Database, settings: &'a AnalyticsSettings) -> Self {
        Self { db, settings }
    }

    /// Process one activity. Returns Ok(false) without writing anything
    /// when a record already exists (unless `force`) or when no stream
    /// data has been synced yet; both cases are retryable no-ops.
    pub fn process(&self, activity_id: i64, force: bool) -> AnalyticsResult<bool> {
        let conn = self.db.connection();
        let analytics = AnalyticsStore::new(conn);

        if !force && analytics.exists(activity_id)? {
            return Ok(false);
        }

        let activity = ActivityStore::new(conn)
            .get(activity_id)?
            .ok_or(AnalyticsError::UnknownActivity(activity_id))?;

        let Some(streams) = StreamStore::new(conn).get(activity_id)? else {
            tracing::warn!(
                activity_id,
                athlete_id = activity.athlete_id,
                "no stream data synced; skipping analytics"
            );
            return Ok(false);
        };

        let watts = &streams.watts;
        let heartrate = &streams.heartrate;

        // Core metrics over the raw streams.
        let wp = weighted_power(watts);
        let window_seconds: Vec<u32> = PeakWindow::ALL.iter().map(|w| w.seconds()).collect();
        let bests = interval_bests(watts, heartrate, &window_seconds);
        let vam = max_vam(&streams.altitude);
        let decoupling = aerobic_decoupling(watts, heartrate);
        let curve = power_curve(watts, CURVE_DURATIONS);

        let peak_20m = bests
            .get(&PeakWindow::TwentyMinutes.seconds())
            .map(|best| best.power);
        let ride_ftp = peak_20m.map(|p| (p as f64 * FTP_FROM_20MIN_FACTOR) as u16);
        let ride_max_hr = heartrate.iter().copied().max();

        // Baseline in force on this activity's date.
        let athletes = AthleteStore::new(conn);
        let baseline = athletes.get_baseline(activity.athlete_id)?;
        let observation = RideObservation {
            activity_id,
            start_date: activity.start_date,
            ftp_estimate: ride_ftp,
            max_heartrate: ride_max_hr,
        };

        let resolver = BaselineResolver::new(&analytics, self.settings);
        let resolution = resolver.resolve(activity.athlete_id, &baseline, &observation)?;
        if resolution.changed {
            athletes.save_baseline(activity.athlete_id, &resolution.baseline)?;
        }

        // Normalized scores against the resolved FTP.
        let active_ftp = resolution.ftp;
        let mean_power = mean(watts);
        let mean_hr = mean(heartrate);
        let duration_seconds = watts.len() as u32;

        let variability_index = if mean_power > 0.0 {
            round2(wp as f64 / mean_power)
        } else {
            1.0
        };
        let efficiency_factor = if mean_hr > 0.0 {
            round2(wp as f64 / mean_hr)
        } else {
            0.0
        };
        let intensity_score = if active_ftp > 0 {
            round2(wp as f64 / active_ftp as f64)
        } else {
            0.0
        };
        let training_stress_score = if active_ftp > 0 {
            round1(
                (duration_seconds as f64 * wp as f64 * intensity_score)
                    / (active_ftp as f64 * 3600.0)
                    * 100.0,
            )
        } else {
            0.0
        };

        let peak = |window: PeakWindow| bests.get(&window.seconds()).copied();
        let record = AnalyticsRecord {
            activity_id,
            peak_power_5s: peak(PeakWindow::FiveSeconds).map(|b| b.power),
            peak_power_1m: peak(PeakWindow::OneMinute).map(|b| b.power),
            peak_power_5m: peak(PeakWindow::FiveMinutes).map(|b| b.power),
            peak_power_20m: peak(PeakWindow::TwentyMinutes).map(|b| b.power),
            peak_hr_5s: peak(PeakWindow::FiveSeconds).and_then(|b: PeakEffort| b.mean_hr),
            peak_hr_1m: peak(PeakWindow::OneMinute).and_then(|b| b.mean_hr),
            peak_hr_5m: peak(PeakWindow::FiveMinutes).and_then(|b| b.mean_hr),
            peak_hr_20m: peak(PeakWindow::TwentyMinutes).and_then(|b| b.mean_hr),
            weighted_power: wp,
            ride_ftp,
            baseline_ftp: active_ftp,
            max_heartrate: ride_max_hr,
            max_vam: vam,
            aerobic_decoupling: decoupling,
            variability_index,
            efficiency_factor,
            intensity_score,
            training_stress_score,
            duration_seconds,
            power_curve: curve,
        };

        analytics.upsert(&record)?;

        tracing::debug!(
            activity_id,
            athlete_id = activity.athlete_id,
            weighted_power = wp,
            baseline_ftp = active_ftp,
            tss = training_stress_score,
            outcome = ?resolution.outcome,
            "analytics record written"
        );

        Ok(true)
    }
}
