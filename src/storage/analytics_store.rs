//! Derived analytics storage operations.
//!
//! Provides persistence for:
//! - Per-activity analytics records (peaks, scores, power curve)
//! - Baseline history queries (best FTP estimate / max HR in a window)
//! - Power-curve and peak-series reads for aggregation
//! - Daily TSS aggregation for the fitness ledger

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use crate::analytics::baseline::{BaselineHistory, HistoricalBest, HistoryWindow};
use crate::analytics::types::{AnalyticsRecord, PeakWindow};
use crate::storage::database::{parse_timestamp, DatabaseError};

/// Store for derived per-activity analytics.
pub struct AnalyticsStore<'a> {
    conn: &'a Connection,
}

impl<'a> AnalyticsStore<'a> {
    /// Create a new analytics store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Whether an analytics record exists for the activity.
    pub fn exists(&self, activity_id: i64) -> Result<bool, DatabaseError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM activity_analytics WHERE activity_id = ?1",
                params![activity_id],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(count > 0)
    }

    /// Write the full record in a single statement. The record is built
    /// entirely in memory first; a partial row can never be observed.
    pub fn upsert(&self, record: &AnalyticsRecord) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let power_curve_json = serde_json::to_string(&record.power_curve)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.conn
            .execute(
                r#"
                INSERT INTO activity_analytics (
                    activity_id,
                    peak_power_5s, peak_power_1m, peak_power_5m, peak_power_20m,
                    peak_hr_5s, peak_hr_1m, peak_hr_5m, peak_hr_20m,
                    weighted_power, ride_ftp, baseline_ftp, max_heartrate,
                    max_vam, aerobic_decoupling, variability_index,
                    efficiency_factor, intensity_score, training_stress_score,
                    duration_seconds, power_curve_json, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                          ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
                ON CONFLICT(activity_id) DO UPDATE SET
                    peak_power_5s = excluded.peak_power_5s,
                    peak_power_1m = excluded.peak_power_1m,
                    peak_power_5m = excluded.peak_power_5m,
                    peak_power_20m = excluded.peak_power_20m,
                    peak_hr_5s = excluded.peak_hr_5s,
                    peak_hr_1m = excluded.peak_hr_1m,
                    peak_hr_5m = excluded.peak_hr_5m,
                    peak_hr_20m = excluded.peak_hr_20m,
                    weighted_power = excluded.weighted_power,
                    ride_ftp = excluded.ride_ftp,
                    baseline_ftp = excluded.baseline_ftp,
                    max_heartrate = excluded.max_heartrate,
                    max_vam = excluded.max_vam,
                    aerobic_decoupling = excluded.aerobic_decoupling,
                    variability_index = excluded.variability_index,
                    efficiency_factor = excluded.efficiency_factor,
                    intensity_score = excluded.intensity_score,
                    training_stress_score = excluded.training_stress_score,
                    duration_seconds = excluded.duration_seconds,
                    power_curve_json = excluded.power_curve_json,
                    updated_at = excluded.updated_at
                "#,
                params![
                    record.activity_id,
                    record.peak_power_5s,
                    record.peak_power_1m,
                    record.peak_power_5m,
                    record.peak_power_20m,
                    record.peak_hr_5s,
                    record.peak_hr_1m,
                    record.peak_hr_5m,
                    record.peak_hr_20m,
                    record.weighted_power,
                    record.ride_ftp,
                    record.baseline_ftp,
                    record.max_heartrate,
                    record.max_vam,
                    record.aerobic_decoupling,
                    record.variability_index,
                    record.efficiency_factor,
                    record.intensity_score,
                    record.training_stress_score,
                    record.duration_seconds,
                    power_curve_json,
                    now,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Load the analytics record for an activity.
    pub fn get(&self, activity_id: i64) -> Result<Option<AnalyticsRecord>, DatabaseError> {
        let result = self.conn.query_row(
            "SELECT activity_id,
                    peak_power_5s, peak_power_1m, peak_power_5m, peak_power_20m,
                    peak_hr_5s, peak_hr_1m, peak_hr_5m, peak_hr_20m,
                    weighted_power, ride_ftp, baseline_ftp, max_heartrate,
                    max_vam, aerobic_decoupling, variability_index,
                    efficiency_factor, intensity_score, training_stress_score,
                    duration_seconds, power_curve_json
             FROM activity_analytics WHERE activity_id = ?1",
            params![activity_id],
            |row| {
                Ok(AnalyticsRow {
                    activity_id: row.get(0)?,
                    peak_power_5s: row.get(1)?,
                    peak_power_1m: row.get(2)?,
                    peak_power_5m: row.get(3)?,
                    peak_power_20m: row.get(4)?,
                    peak_hr_5s: row.get(5)?,
                    peak_hr_1m: row.get(6)?,
                    peak_hr_5m: row.get(7)?,
                    peak_hr_20m: row.get(8)?,
                    weighted_power: row.get(9)?,
                    ride_ftp: row.get(10)?,
                    baseline_ftp: row.get(11)?,
                    max_heartrate: row.get(12)?,
                    max_vam: row.get(13)?,
                    aerobic_decoupling: row.get(14)?,
                    variability_index: row.get(15)?,
                    efficiency_factor: row.get(16)?,
                    intensity_score: row.get(17)?,
                    training_stress_score: row.get(18)?,
                    duration_seconds: row.get(19)?,
                    power_curve_json: row.get(20)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row.into_record()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    // ========== Baseline history queries ==========

    /// Best value of one analytics column within a history window.
    fn best_value(
        &self,
        column: &str,
        athlete_id: i64,
        window: HistoryWindow,
    ) -> Result<Option<HistoricalBest>, DatabaseError> {
        // Column names are fixed internally; reject anything else rather
        // than interpolate caller input.
        let column = match column {
            "ride_ftp" => "ride_ftp",
            "max_heartrate" => "max_heartrate",
            other => {
                return Err(DatabaseError::QueryFailed(format!(
                    "Unsupported history column: {}",
                    other
                )))
            }
        };

        let end_op = if window.inclusive_end { "<=" } else { "<" };
        let sql = format!(
            "SELECT aa.{col}, aa.activity_id, a.start_date
             FROM activity_analytics aa
             JOIN activities a ON a.id = aa.activity_id
             WHERE a.athlete_id = ?1
               AND aa.{col} IS NOT NULL
               AND a.start_date >= ?2
               AND a.start_date {end_op} ?3
               AND aa.activity_id <> ?4
             ORDER BY aa.{col} DESC, a.start_date DESC
             LIMIT 1",
            col = column,
            end_op = end_op,
        );

        // -1 never matches a real activity id.
        let exclude = window.exclude_activity.unwrap_or(-1);

        let result = self.conn.query_row(
            &sql,
            params![
                athlete_id,
                window.from.to_rfc3339(),
                window.until.to_rfc3339(),
                exclude,
            ],
            |row| {
                Ok((
                    row.get::<_, u16>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        );

        match result {
            Ok((value, activity_id, start_date)) => Ok(Some(HistoricalBest {
                value,
                activity_id,
                start_date: parse_timestamp(&start_date)?,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    // ========== Aggregation reads ==========

    /// Power curves of an athlete's activities dated at or after `since`.
    pub fn power_curves_since(
        &self,
        athlete_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<BTreeMap<u32, u16>>, DatabaseError> {
        let since = since.unwrap_or(DateTime::UNIX_EPOCH);

        let mut stmt = self
            .conn
            .prepare(
                "SELECT aa.power_curve_json
                 FROM activity_analytics aa
                 JOIN activities a ON a.id = aa.activity_id
                 WHERE a.athlete_id = ?1 AND a.start_date >= ?2",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![athlete_id, since.to_rfc3339()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut curves = Vec::new();
        for row in rows {
            let json = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            let curve: BTreeMap<u32, u16> = serde_json::from_str(&json)
                .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
            curves.push(curve);
        }

        Ok(curves)
    }

    /// Chronological (start date, peak power) series for one fixed window.
    pub fn peak_series(
        &self,
        athlete_id: i64,
        window: PeakWindow,
    ) -> Result<Vec<(DateTime<Utc>, u16)>, DatabaseError> {
        let column = match window {
            PeakWindow::FiveSeconds => "peak_power_5s",
            PeakWindow::OneMinute => "peak_power_1m",
            PeakWindow::FiveMinutes => "peak_power_5m",
            PeakWindow::TwentyMinutes => "peak_power_20m",
        };

        let sql = format!(
            "SELECT a.start_date, aa.{col}
             FROM activity_analytics aa
             JOIN activities a ON a.id = aa.activity_id
             WHERE a.athlete_id = ?1 AND aa.{col} IS NOT NULL
             ORDER BY a.start_date ASC",
            col = column,
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![athlete_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u16>(1)?))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut series = Vec::new();
        for row in rows {
            let (date, value) = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            series.push((parse_timestamp(&date)?, value));
        }

        Ok(series)
    }

    /// Per-day TSS totals in [from, through], ordered by day. Days without
    /// activities are absent.
    pub fn daily_tss_between(
        &self,
        athlete_id: i64,
        from: NaiveDate,
        through: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT date(a.start_date) AS day, SUM(aa.training_stress_score)
                 FROM activity_analytics aa
                 JOIN activities a ON a.id = aa.activity_id
                 WHERE a.athlete_id = ?1
                   AND date(a.start_date) >= ?2
                   AND date(a.start_date) <= ?3
                 GROUP BY day
                 ORDER BY day",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    athlete_id,
                    from.format("%Y-%m-%d").to_string(),
                    through.format("%Y-%m-%d").to_string(),
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut totals = Vec::new();
        for row in rows {
            let (day, tss) = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
            totals.push((day, tss));
        }

        Ok(totals)
    }
}

impl BaselineHistory for AnalyticsStore<'_> {
    fn best_ride_ftp(
        &self,
        athlete_id: i64,
        window: HistoryWindow,
    ) -> Result<Option<HistoricalBest>, DatabaseError> {
        self.best_value("ride_ftp", athlete_id, window)
    }

    fn best_max_hr(
        &self,
        athlete_id: i64,
        window: HistoryWindow,
    ) -> Result<Option<HistoricalBest>, DatabaseError> {
        self.best_value("max_heartrate", athlete_id, window)
    }
}

/// Intermediate struct for reading analytics rows from database.
struct AnalyticsRow {
    activity_id: i64,
    peak_power_5s: Option<u16>,
    peak_power_1m: Option<u16>,
    peak_power_5m: Option<u16>,
    peak_power_20m: Option<u16>,
    peak_hr_5s: Option<u16>,
    peak_hr_1m: Option<u16>,
    peak_hr_5m: Option<u16>,
    peak_hr_20m: Option<u16>,
    weighted_power: u16,
    ride_ftp: Option<u16>,
    baseline_ftp: u16,
    max_heartrate: Option<u16>,
    max_vam: i32,
    aerobic_decoupling: Option<f64>,
    variability_index: f64,
    efficiency_factor: f64,
    intensity_score: f64,
    training_stress_score: f64,
    duration_seconds: u32,
    power_curve_json: String,
}

impl AnalyticsRow {
    fn into_record(self) -> Result<AnalyticsRecord, DatabaseError> {
        let power_curve: BTreeMap<u32, u16> = serde_json::from_str(&self.power_curve_json)
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;

        Ok(AnalyticsRecord {
            activity_id: self.activity_id,
            peak_power_5s: self.peak_power_5s,
            peak_power_1m: self.peak_power_1m,
            peak_power_5m: self.peak_power_5m,
            peak_power_20m: self.peak_power_20m,
            peak_hr_5s: self.peak_hr_5s,
            peak_hr_1m: self.peak_hr_1m,
            peak_hr_5m: self.peak_hr_5m,
            peak_hr_20m: self.peak_hr_20m,
            weighted_power: self.weighted_power,
            ride_ftp: self.ride_ftp,
            baseline_ftp: self.baseline_ftp,
            max_heartrate: self.max_heartrate,
            max_vam: self.max_vam,
            aerobic_decoupling: self.aerobic_decoupling,
            variability_index: self.variability_index,
            efficiency_factor: self.efficiency_factor,
            intensity_score: self.intensity_score,
            training_stress_score: self.training_stress_score,
            duration_seconds: self.duration_seconds,
            power_curve,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::types::Activity;
    use crate::storage::activity_store::ActivityStore;
    use crate::storage::athlete_store::AthleteStore;
    use crate::storage::database::Database;
    use chrono::TimeZone;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        AthleteStore::new(db.connection())
            .upsert_profile(7, Some("Test"), None)
            .expect("Failed to create athlete");
        db
    }

    fn seed_activity(db: &Database, id: i64, day: u32) -> DateTime<Utc> {
        let start = Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
        ActivityStore::new(db.connection())
            .upsert(&Activity {
                id,
                athlete_id: 7,
                name: None,
                kind: "Ride".to_string(),
                start_date: start,
                needs_recalculation: false,
            })
            .expect("Failed to create activity");
        start
    }

    fn record(activity_id: i64, ride_ftp: u16, tss: f64) -> AnalyticsRecord {
        AnalyticsRecord {
            activity_id,
            ride_ftp: Some(ride_ftp),
            max_heartrate: Some(175),
            weighted_power: 210,
            baseline_ftp: 200,
            variability_index: 1.05,
            training_stress_score: tss,
            duration_seconds: 3600,
            power_curve: BTreeMap::from([(60, 320), (300, 260)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_and_get_roundtrip() {
        let db = setup_db();
        seed_activity(&db, 1, 1);
        let store = AnalyticsStore::new(db.connection());

        let rec = record(1, 240, 80.0);
        store.upsert(&rec).expect("Failed to upsert");

        let loaded = store.get(1).expect("Failed to get").expect("Not found");
        assert_eq!(loaded, rec);
        assert!(store.exists(1).expect("Failed to check"));
    }

    #[test]
    fn test_upsert_overwrites() {
        let db = setup_db();
        seed_activity(&db, 1, 1);
        let store = AnalyticsStore::new(db.connection());

        store.upsert(&record(1, 240, 80.0)).expect("Failed");
        store.upsert(&record(1, 250, 90.0)).expect("Failed");

        let loaded = store.get(1).expect("Failed to get").expect("Not found");
        assert_eq!(loaded.ride_ftp, Some(250));
        assert_eq!(loaded.training_stress_score, 90.0);
    }

    #[test]
    fn test_best_ride_ftp_window_bounds() {
        let db = setup_db();
        let store = AnalyticsStore::new(db.connection());

        let d5 = seed_activity(&db, 1, 5);
        seed_activity(&db, 2, 10);
        let d20 = seed_activity(&db, 3, 20);
        store.upsert(&record(1, 230, 50.0)).expect("Failed");
        store.upsert(&record(2, 260, 50.0)).expect("Failed");
        store.upsert(&record(3, 280, 50.0)).expect("Failed");

        // Exclusive end: activity 3 dated exactly at `until` is ignored.
        let window = HistoryWindow {
            from: d5,
            until: d20,
            inclusive_end: false,
            exclude_activity: None,
        };
        let best = store
            .best_ride_ftp(7, window)
            .expect("Failed to query")
            .expect("No history");
        assert_eq!(best.value, 260);
        assert_eq!(best.activity_id, 2);

        // Inclusive end picks it up.
        let window = HistoryWindow {
            inclusive_end: true,
            ..window
        };
        let best = store
            .best_ride_ftp(7, window)
            .expect("Failed to query")
            .expect("No history");
        assert_eq!(best.value, 280);

        // Excluding the activity under processing.
        let window = HistoryWindow {
            exclude_activity: Some(3),
            ..window
        };
        let best = store
            .best_ride_ftp(7, window)
            .expect("Failed to query")
            .expect("No history");
        assert_eq!(best.value, 260);
    }

    #[test]
    fn test_daily_tss_groups_by_day() {
        let db = setup_db();
        let store = AnalyticsStore::new(db.connection());

        seed_activity(&db, 1, 5);
        seed_activity(&db, 2, 5);
        seed_activity(&db, 3, 6);
        store.upsert(&record(1, 230, 40.0)).expect("Failed");
        store.upsert(&record(2, 230, 35.0)).expect("Failed");
        store.upsert(&record(3, 230, 60.0)).expect("Failed");

        let totals = store
            .daily_tss_between(
                7,
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            )
            .expect("Failed to aggregate");

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].1, 75.0);
        assert_eq!(totals[1].1, 60.0);
    }

    #[test]
    fn test_peak_series_chronological() {
        let db = setup_db();
        let store = AnalyticsStore::new(db.connection());

        seed_activity(&db, 2, 10);
        seed_activity(&db, 1, 5);

        let mut rec = record(1, 230, 40.0);
        rec.peak_power_20m = Some(250);
        store.upsert(&rec).expect("Failed");
        let mut rec = record(2, 230, 40.0);
        rec.peak_power_20m = Some(270);
        store.upsert(&rec).expect("Failed");

        let series = store
            .peak_series(7, PeakWindow::TwentyMinutes)
            .expect("Failed to query");
        assert_eq!(series.len(), 2);
        assert!(series[0].0 < series[1].0);
        assert_eq!(series[0].1, 250);
        assert_eq!(series[1].1, 270);
    }
}
