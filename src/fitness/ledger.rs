//! Daily fitness ledger.
//!
//! Rolls per-activity training stress into one CTL/ATL/TSB row per
//! athlete-day. The scheduler triggers a recompute from the earliest
//! reprocessed date after every successful batch, so the ledger stays
//! consistent with the analytics records it is derived from.

use chrono::{NaiveDate, Utc};

use crate::fitness::load::{DailyLoad, LoadCalculator};
use crate::storage::database::{Database, DatabaseError};
use crate::storage::{AnalyticsStore, FitnessStore};

/// Post-batch collaborator contract: rebuild daily fitness from a date
/// forward. Returns the number of days processed.
pub trait FitnessLedger {
    fn recompute_from(&self, athlete_id: i64, from: NaiveDate) -> Result<u32, DatabaseError>;
}

/// Ledger implementation over the analytics store.
pub struct DailyFitnessLedger<'a> {
    db: &'a Database,
}

impl<'a> DailyFitnessLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }
}

impl FitnessLedger for DailyFitnessLedger<'_> {
    fn recompute_from(&self, athlete_id: i64, from: NaiveDate) -> Result<u32, DatabaseError> {
        let today = Utc::now().date_naive();
        if from > today {
            return Ok(0);
        }

        let analytics = AnalyticsStore::new(self.db.connection());
        let fitness = FitnessStore::new(self.db.connection());

        // Seed from the last row before the recompute range; a brand-new
        // athlete starts from zero.
        let mut prev = fitness
            .latest_before(athlete_id, from)?
            .map(|(_, load)| load)
            .unwrap_or_default();

        let daily_tss: std::collections::BTreeMap<NaiveDate, f64> = analytics
            .daily_tss_between(athlete_id, from, today)?
            .into_iter()
            .collect();

        let calculator = LoadCalculator::new();
        let mut day = from;
        let mut days_processed = 0u32;

        // Walk every calendar day; rest days carry zero TSS and decay the
        // averages.
        while day <= today {
            let tss = daily_tss.get(&day).copied().unwrap_or(0.0);
            let load = calculator.calculate_day(prev, tss);
            fitness.upsert_day(athlete_id, day, &load)?;

            prev = load;
            day = day.succ_opt().expect("date overflow");
            days_processed += 1;
        }

        tracing::debug!(
            athlete_id,
            from = %from,
            days = days_processed,
            "fitness ledger recomputed"
        );

        Ok(days_processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::types::{Activity, AnalyticsRecord};
    use crate::storage::{ActivityStore, AthleteStore};
    use chrono::Duration;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        AthleteStore::new(db.connection())
            .upsert_profile(7, Some("Test"), None)
            .expect("Failed to create athlete");
        db
    }

    fn seed_ride_with_tss(db: &Database, id: i64, days_ago: i64, tss: f64) -> NaiveDate {
        let start = Utc::now() - Duration::days(days_ago);
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

        AnalyticsStore::new(db.connection())
            .upsert(&AnalyticsRecord {
                activity_id: id,
                weighted_power: 200,
                baseline_ftp: 200,
                training_stress_score: tss,
                duration_seconds: 3600,
                ..Default::default()
            })
            .expect("Failed to create record");

        start.date_naive()
    }

    #[test]
    fn test_recompute_fills_every_day_through_today() {
        let db = setup_db();
        let from = seed_ride_with_tss(&db, 1, 5, 80.0);

        let ledger = DailyFitnessLedger::new(&db);
        let days = ledger.recompute_from(7, from).expect("Failed to recompute");
        assert_eq!(days, 6); // ride day + 5 days through today

        let fitness = FitnessStore::new(db.connection());
        let ride_day = fitness
            .get_day(7, from)
            .expect("Failed to load")
            .expect("No row");
        assert_eq!(ride_day.tss, 80.0);
        assert!(ride_day.atl > 0.0);

        // A rest day after the ride exists and has decayed values.
        let next = fitness
            .get_day(7, from.succ_opt().unwrap())
            .expect("Failed to load")
            .expect("No row");
        assert_eq!(next.tss, 0.0);
        assert!(next.atl < ride_day.atl);
    }

    #[test]
    fn test_recompute_future_date_is_noop() {
        let db = setup_db();
        let ledger = DailyFitnessLedger::new(&db);
        let future = Utc::now().date_naive() + Duration::days(10);
        assert_eq!(ledger.recompute_from(7, future).expect("ok"), 0);
    }
}
