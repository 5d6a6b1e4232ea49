//! High-level engine facade.
//!
//! Wires the stores, processor, cascade, scheduler and aggregator over one
//! database handle. This is the surface ingestion jobs and route handlers
//! call; nothing here adds logic beyond wiring and argument conversion.

use std::collections::BTreeMap;

use chrono::{DateTime, Months, Utc};

use crate::analytics::aggregator::{PowerCurveAggregator, SeasonalSeries};
use crate::analytics::error::{AnalyticsError, AnalyticsResult};
use crate::analytics::invalidation::InvalidationCascade;
use crate::analytics::processor::ActivityAnalyticsProcessor;
use crate::analytics::scheduler::RecalculationScheduler;
use crate::analytics::types::PeakWindow;
use crate::fitness::DailyFitnessLedger;
use crate::storage::config::{AnalyticsSettings, AppConfig};
use crate::storage::{ActivityStore, AthleteStore, Database, DatabaseError};

/// The analytics engine over one database.
pub struct AnalyticsEngine {
    db: Database,
    settings: AnalyticsSettings,
}

impl AnalyticsEngine {
    /// Build an engine over an already-open database.
    pub fn new(db: Database, settings: AnalyticsSettings) -> Self {
        Self { db, settings }
    }

    /// Open the database configured in `config`.
    pub fn open(config: &AppConfig) -> Result<Self, DatabaseError> {
        let db = Database::open(&config.database_path())?;
        Ok(Self::new(db, config.analytics.clone()))
    }

    /// In-memory engine (tests, scratch runs).
    pub fn open_in_memory(settings: AnalyticsSettings) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open_in_memory()?, settings))
    }

    /// Access the underlying database (ingestion-side seeding, tests).
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Compute and persist analytics for one activity.
    pub fn process_activity(&self, activity_id: i64, force: bool) -> AnalyticsResult<bool> {
        ActivityAnalyticsProcessor::new(&self.db, &self.settings).process(activity_id, force)
    }

    /// Flag everything from `from` forward for recalculation.
    pub fn invalidate_forward(
        &self,
        athlete_id: i64,
        from: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        InvalidationCascade::new(&self.db).invalidate_forward(athlete_id, from)
    }

    /// Historical activities were inserted; invalidate with the one-day
    /// safety margin.
    pub fn activities_backfilled(
        &self,
        athlete_id: i64,
        earliest_inserted: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        InvalidationCascade::new(&self.db).after_backfill(athlete_id, earliest_inserted)
    }

    /// An activity summary was edited in place.
    pub fn activity_edited(&self, activity_id: i64) -> AnalyticsResult<usize> {
        let activity = ActivityStore::new(self.db.connection())
            .get(activity_id)?
            .ok_or(AnalyticsError::UnknownActivity(activity_id))?;

        Ok(InvalidationCascade::new(&self.db).after_edit(&activity)?)
    }

    /// Delete an activity and invalidate from its date forward.
    pub fn delete_activity(&self, activity_id: i64) -> AnalyticsResult<usize> {
        let store = ActivityStore::new(self.db.connection());
        let activity = store
            .get(activity_id)?
            .ok_or(AnalyticsError::UnknownActivity(activity_id))?;

        store.delete(activity_id)?;
        Ok(InvalidationCascade::new(&self.db)
            .after_delete(activity.athlete_id, activity.start_date)?)
    }

    /// Set or clear an athlete's manual FTP override, then invalidate every
    /// activity the override can affect.
    pub fn set_manual_ftp(
        &self,
        athlete_id: i64,
        manual_ftp: Option<u16>,
        effective_at: Option<DateTime<Utc>>,
    ) -> AnalyticsResult<usize> {
        let athletes = AthleteStore::new(self.db.connection());
        let mut baseline = athletes.get_baseline(athlete_id)?;

        let invalidate_from = effective_at
            .or(baseline.manual_ftp_effective_at)
            .unwrap_or(DateTime::UNIX_EPOCH);

        baseline.manual_ftp = manual_ftp;
        baseline.manual_ftp_effective_at = effective_at;
        athletes.save_baseline(athlete_id, &baseline)?;

        Ok(InvalidationCascade::new(&self.db).invalidate_forward(athlete_id, invalidate_from)?)
    }

    /// Drain one athlete's recalculation queue.
    pub fn drain_recalc_queue(&self, athlete_id: i64, batch_size: usize) -> AnalyticsResult<usize> {
        let ledger = DailyFitnessLedger::new(&self.db);
        RecalculationScheduler::new(&self.db, &self.settings, &ledger).drain(athlete_id, batch_size)
    }

    /// Drain every athlete with a backlog.
    pub fn drain_all(&self, batch_size: usize) -> AnalyticsResult<usize> {
        let ledger = DailyFitnessLedger::new(&self.db);
        RecalculationScheduler::new(&self.db, &self.settings, &ledger).drain_all(batch_size)
    }

    /// Best-ever power per duration, optionally limited to the last
    /// `since_months` months.
    pub fn best_power_envelope(
        &self,
        athlete_id: i64,
        since_months: Option<u32>,
    ) -> Result<BTreeMap<u32, u16>, DatabaseError> {
        let since = since_months
            .and_then(|months| Utc::now().checked_sub_months(Months::new(months)));
        PowerCurveAggregator::new(&self.db).best_envelope(athlete_id, since)
    }

    /// Progression series for one fixed peak window.
    pub fn seasonal_series(
        &self,
        athlete_id: i64,
        window: PeakWindow,
    ) -> Result<SeasonalSeries, DatabaseError> {
        PowerCurveAggregator::new(&self.db).seasonal_series(athlete_id, window)
    }
}
