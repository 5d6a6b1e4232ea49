//! Power-curve aggregation over persisted analytics.
//!
//! Read-only: merges the per-activity power curves into "best ever"
//! envelopes and builds the progression series behind the seasonal peak
//! charts. Never touches the baseline or the recalculation queue.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::analytics::types::PeakWindow;
use crate::storage::{AnalyticsStore, Database, DatabaseError};

/// Trailing window for "recent" peaks, days.
const ROLLING_WINDOW_DAYS: i64 = 30;

/// One point of a seasonal progression series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonalPoint {
    pub date: DateTime<Utc>,
    /// The activity's own peak for the window.
    pub value: u16,
    /// Best value up to and including this point.
    pub all_time_max: u16,
    /// Best value within the trailing 30 days ending at this point.
    pub rolling_max: u16,
}

/// Progression data for one fixed peak window.
#[derive(Debug, Clone, Default)]
pub struct SeasonalSeries {
    pub points: Vec<SeasonalPoint>,
    /// Best value within the last 30 days from now; None when the athlete
    /// has been idle that long.
    pub recent_peak: Option<u16>,
}

/// Aggregator over an athlete's persisted power curves.
pub struct PowerCurveAggregator<'a> {
    db: &'a Database,
}

impl<'a> PowerCurveAggregator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Merge all power curves dated at or after `since` into the best
    /// observed power per duration. A plain associative max-merge, so the
    /// result is independent of activity order.
    pub fn best_envelope(
        &self,
        athlete_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<BTreeMap<u32, u16>, DatabaseError> {
        let curves = AnalyticsStore::new(self.db.connection()).power_curves_since(athlete_id, since)?;

        let mut envelope: BTreeMap<u32, u16> = BTreeMap::new();
        for curve in curves {
            for (duration, power) in curve {
                envelope
                    .entry(duration)
                    .and_modify(|best| *best = (*best).max(power))
                    .or_insert(power);
            }
        }

        Ok(envelope)
    }

    /// Chronological progression for one fixed window: each point carries
    /// the all-time max so far and the trailing 30-day max, so charts
    /// never recompute client-side.
    pub fn seasonal_series(
        &self,
        athlete_id: i64,
        window: PeakWindow,
    ) -> Result<SeasonalSeries, DatabaseError> {
        let series = AnalyticsStore::new(self.db.connection()).peak_series(athlete_id, window)?;
        if series.is_empty() {
            return Ok(SeasonalSeries::default());
        }

        let mut points = Vec::with_capacity(series.len());
        let mut all_time_max = 0u16;

        for (i, &(date, value)) in series.iter().enumerate() {
            all_time_max = all_time_max.max(value);

            // Trailing window: walk backward through the sorted series
            // until a sample falls out of range.
            let cutoff = date - Duration::days(ROLLING_WINDOW_DAYS);
            let mut rolling_max = value;
            for &(prev_date, prev_value) in series[..i].iter().rev() {
                if prev_date < cutoff {
                    break;
                }
                rolling_max = rolling_max.max(prev_value);
            }

            points.push(SeasonalPoint {
                date,
                value,
                all_time_max,
                rolling_max,
            });
        }

        // Profile summary peak: relative to today, not to each ride.
        let recent_cutoff = Utc::now() - Duration::days(ROLLING_WINDOW_DAYS);
        let recent_peak = series
            .iter()
            .filter(|(date, _)| *date >= recent_cutoff)
            .map(|&(_, value)| value)
            .max();

        Ok(SeasonalSeries {
            points,
            recent_peak,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::types::{Activity, AnalyticsRecord};
    use crate::storage::{ActivityStore, AthleteStore};
    use chrono::TimeZone;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        AthleteStore::new(db.connection())
            .upsert_profile(7, Some("Test"), None)
            .expect("Failed to create athlete");
        db
    }

    fn seed_curve(
        db: &Database,
        id: i64,
        start: DateTime<Utc>,
        curve: &[(u32, u16)],
        peak_20m: Option<u16>,
    ) {
        ActivityStore::new(db.connection())
            .upsert(&Activity {
                id,
                athlete_id: 7,
                name: None,
                kind: "Ride".to_string(),
                start_date: start,
                needs_recalculation: false,
            })
            .expect("Failed to insert activity");

        AnalyticsStore::new(db.connection())
            .upsert(&AnalyticsRecord {
                activity_id: id,
                peak_power_20m: peak_20m,
                weighted_power: 200,
                baseline_ftp: 200,
                duration_seconds: 3600,
                power_curve: curve.iter().copied().collect(),
                ..Default::default()
            })
            .expect("Failed to insert record");
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_envelope_takes_max_per_duration() {
        let db = setup_db();
        seed_curve(&db, 1, date(2024, 1, 10), &[(60, 350), (300, 280)], None);
        seed_curve(&db, 2, date(2024, 2, 10), &[(60, 320), (300, 300), (1200, 250)], None);

        let aggregator = PowerCurveAggregator::new(&db);
        let envelope = aggregator
            .best_envelope(7, None)
            .expect("Failed to aggregate");

        assert_eq!(envelope[&60], 350);
        assert_eq!(envelope[&300], 300);
        assert_eq!(envelope[&1200], 250);
    }

    #[test]
    fn test_envelope_is_order_independent() {
        let curves = [
            (1i64, date(2024, 1, 10), vec![(60u32, 350u16), (300, 280)]),
            (2, date(2024, 2, 10), vec![(60, 320), (300, 300)]),
            (3, date(2024, 3, 10), vec![(60, 340), (1200, 250)]),
        ];

        // Insert in two different orders and compare the envelopes.
        let mut envelopes = Vec::new();
        for order in [[0usize, 1, 2], [2, 0, 1]] {
            let db = setup_db();
            for &i in &order {
                let (id, start, curve) = &curves[i];
                seed_curve(&db, *id, *start, curve, None);
            }
            let aggregator = PowerCurveAggregator::new(&db);
            envelopes.push(aggregator.best_envelope(7, None).expect("Failed"));
        }

        assert_eq!(envelopes[0], envelopes[1]);
    }

    #[test]
    fn test_envelope_respects_since_filter() {
        let db = setup_db();
        seed_curve(&db, 1, date(2024, 1, 10), &[(60, 400)], None);
        seed_curve(&db, 2, date(2024, 3, 10), &[(60, 320)], None);

        let aggregator = PowerCurveAggregator::new(&db);
        let envelope = aggregator
            .best_envelope(7, Some(date(2024, 2, 1)))
            .expect("Failed to aggregate");

        assert_eq!(envelope[&60], 320);
    }

    #[test]
    fn test_seasonal_series_maxima() {
        let db = setup_db();
        seed_curve(&db, 1, date(2024, 1, 1), &[], Some(250));
        seed_curve(&db, 2, date(2024, 1, 20), &[], Some(280));
        // Far enough from the January rides that the rolling window resets.
        seed_curve(&db, 3, date(2024, 4, 1), &[], Some(260));

        let aggregator = PowerCurveAggregator::new(&db);
        let series = aggregator
            .seasonal_series(7, PeakWindow::TwentyMinutes)
            .expect("Failed to build series");

        assert_eq!(series.points.len(), 3);

        assert_eq!(series.points[0].all_time_max, 250);
        assert_eq!(series.points[0].rolling_max, 250);

        assert_eq!(series.points[1].all_time_max, 280);
        assert_eq!(series.points[1].rolling_max, 280);

        // April: all-time still 280, but the trailing window only holds
        // the April ride.
        assert_eq!(series.points[2].all_time_max, 280);
        assert_eq!(series.points[2].rolling_max, 260);

        // All rides are long past; no recent peak.
        assert_eq!(series.recent_peak, None);
    }

    #[test]
    fn test_recent_peak_relative_to_today() {
        let db = setup_db();
        seed_curve(&db, 1, date(2024, 1, 1), &[], Some(280));
        seed_curve(&db, 2, Utc::now() - Duration::days(3), &[], Some(240));

        let aggregator = PowerCurveAggregator::new(&db);
        let series = aggregator
            .seasonal_series(7, PeakWindow::TwentyMinutes)
            .expect("Failed to build series");

        assert_eq!(series.recent_peak, Some(240));
    }

    #[test]
    fn test_empty_history() {
        let db = setup_db();
        let aggregator = PowerCurveAggregator::new(&db);

        assert!(aggregator
            .best_envelope(7, None)
            .expect("Failed")
            .is_empty());
        let series = aggregator
            .seasonal_series(7, PeakWindow::TwentyMinutes)
            .expect("Failed");
        assert!(series.points.is_empty());
        assert_eq!(series.recent_peak, None);
    }
}
