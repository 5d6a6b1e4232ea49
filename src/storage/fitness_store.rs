//! Daily fitness ledger storage operations.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};

use crate::fitness::load::DailyLoad;
use crate::storage::database::DatabaseError;

/// Store for per-athlete daily CTL/ATL/TSB rows.
pub struct FitnessStore<'a> {
    conn: &'a Connection,
}

impl<'a> FitnessStore<'a> {
    /// Create a new fitness store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Save or update one athlete-day.
    pub fn upsert_day(
        &self,
        athlete_id: i64,
        day: NaiveDate,
        load: &DailyLoad,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO athlete_daily_metrics (athlete_id, day, tss, ctl, atl, tsb, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(athlete_id, day) DO UPDATE SET
                    tss = excluded.tss,
                    ctl = excluded.ctl,
                    atl = excluded.atl,
                    tsb = excluded.tsb
                "#,
                params![
                    athlete_id,
                    day.format("%Y-%m-%d").to_string(),
                    load.tss,
                    load.ctl,
                    load.atl,
                    load.tsb,
                    now,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Load one athlete-day.
    pub fn get_day(
        &self,
        athlete_id: i64,
        day: NaiveDate,
    ) -> Result<Option<DailyLoad>, DatabaseError> {
        let result = self.conn.query_row(
            "SELECT tss, ctl, atl, tsb FROM athlete_daily_metrics
             WHERE athlete_id = ?1 AND day = ?2",
            params![athlete_id, day.format("%Y-%m-%d").to_string()],
            |row| {
                Ok(DailyLoad {
                    tss: row.get(0)?,
                    ctl: row.get(1)?,
                    atl: row.get(2)?,
                    tsb: row.get(3)?,
                })
            },
        );

        match result {
            Ok(load) => Ok(Some(load)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// The most recent row strictly before `day`; seeds a forward
    /// recomputation.
    pub fn latest_before(
        &self,
        athlete_id: i64,
        day: NaiveDate,
    ) -> Result<Option<(NaiveDate, DailyLoad)>, DatabaseError> {
        let result = self.conn.query_row(
            "SELECT day, tss, ctl, atl, tsb FROM athlete_daily_metrics
             WHERE athlete_id = ?1 AND day < ?2
             ORDER BY day DESC LIMIT 1",
            params![athlete_id, day.format("%Y-%m-%d").to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    DailyLoad {
                        tss: row.get(1)?,
                        ctl: row.get(2)?,
                        atl: row.get(3)?,
                        tsb: row.get(4)?,
                    },
                ))
            },
        );

        match result {
            Ok((day_str, load)) => {
                let day = NaiveDate::parse_from_str(&day_str, "%Y-%m-%d")
                    .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
                Ok(Some((day, load)))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::athlete_store::AthleteStore;
    use crate::storage::database::Database;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        AthleteStore::new(db.connection())
            .upsert_profile(7, Some("Test"), None)
            .expect("Failed to create athlete");
        db
    }

    #[test]
    fn test_upsert_and_get_day() {
        let db = setup_db();
        let store = FitnessStore::new(db.connection());
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let load = DailyLoad {
            tss: 75.0,
            ctl: 50.0,
            atl: 60.0,
            tsb: -10.0,
        };
        store.upsert_day(7, day, &load).expect("Failed to save");

        let loaded = store
            .get_day(7, day)
            .expect("Failed to load")
            .expect("No row");
        assert!((loaded.tss - 75.0).abs() < 0.001);
        assert!((loaded.tsb - -10.0).abs() < 0.001);
    }

    #[test]
    fn test_latest_before_seeds_recompute() {
        let db = setup_db();
        let store = FitnessStore::new(db.connection());

        for (day, ctl) in [(1, 40.0), (2, 42.0), (3, 44.0)] {
            let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
            let load = DailyLoad {
                tss: 50.0,
                ctl,
                atl: 45.0,
                tsb: 0.0,
            };
            store.upsert_day(7, date, &load).expect("Failed to save");
        }

        let (seed_day, seed) = store
            .latest_before(7, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap())
            .expect("Failed to query")
            .expect("No seed");
        assert_eq!(seed_day, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!((seed.ctl - 42.0).abs() < 0.001);
    }
}
