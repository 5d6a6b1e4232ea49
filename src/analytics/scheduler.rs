//! Chronological recalculation scheduling.
//!
//! Drains the recalculation queue for one or all athletes. Within one
//! athlete the queue is processed strictly oldest-first; the baseline
//! resolver is only correct when every earlier-dated activity has been
//! processed before a later one. Across athletes there is no shared
//! state and each athlete's batch is isolated.

use chrono::{DateTime, Utc};

use crate::analytics::error::AnalyticsResult;
use crate::analytics::processor::ActivityAnalyticsProcessor;
use crate::fitness::FitnessLedger;
use crate::storage::config::AnalyticsSettings;
use crate::storage::{ActivityStore, AthleteStore, Database};

/// Queue drainer for flagged activities.
pub struct RecalculationScheduler<'a> {
    db: &'a Database,
    settings: &'a AnalyticsSettings,
    ledger: &'a dyn FitnessLedger,
}

impl<'a> RecalculationScheduler<'a> {
    pub fn new(
        db: &'a Database,
        settings: &'a AnalyticsSettings,
        ledger: &'a dyn FitnessLedger,
    ) -> Self {
        Self {
            db,
            settings,
            ledger,
        }
    }

    /// Drain up to `batch_size` flagged activities for one athlete,
    /// oldest first. Returns the number successfully reprocessed.
    ///
    /// A single activity's failure is logged and skipped; it stays
    /// flagged and the rest of the batch continues. After any success the
    /// fitness ledger is rebuilt from the earliest reprocessed date.
    pub fn drain(&self, athlete_id: i64, batch_size: usize) -> AnalyticsResult<usize> {
        let activities = ActivityStore::new(self.db.connection());
        let queue = activities.flagged_batch(athlete_id, batch_size)?;

        if queue.is_empty() {
            tracing::debug!(athlete_id, "analytics are up to date");
            return Ok(0);
        }

        tracing::info!(athlete_id, count = queue.len(), "recomputing activities");

        let processor = ActivityAnalyticsProcessor::new(self.db, self.settings);
        let mut processed = 0usize;
        let mut earliest: Option<DateTime<Utc>> = None;

        for activity in &queue {
            let result = processor.process(activity.id, true).and_then(|written| {
                if written {
                    activities.clear_recalc_flag(activity.id)?;
                }
                Ok(written)
            });

            match result {
                Ok(true) => {
                    processed += 1;
                    if earliest.map_or(true, |e| activity.start_date < e) {
                        earliest = Some(activity.start_date);
                    }
                }
                Ok(false) => {
                    // Streams not synced yet; leave the flag for a later
                    // pass.
                    tracing::debug!(activity_id = activity.id, "skipped, no stream data");
                }
                Err(err) => {
                    tracing::error!(
                        activity_id = activity.id,
                        athlete_id,
                        error = %err,
                        "failed to reprocess activity, continuing batch"
                    );
                }
            }
        }

        if processed > 0 {
            if let Some(earliest) = earliest {
                match self.ledger.recompute_from(athlete_id, earliest.date_naive()) {
                    Ok(days) => {
                        tracing::info!(athlete_id, days, "fitness ledger synced after batch");
                    }
                    Err(err) => {
                        tracing::error!(athlete_id, error = %err, "fitness ledger recompute failed");
                    }
                }
            }
        }

        Ok(processed)
    }

    /// Drain every athlete with a backlog. One athlete's failure never
    /// aborts the others. Returns the total processed across athletes.
    pub fn drain_all(&self, batch_size: usize) -> AnalyticsResult<usize> {
        let athlete_ids = AthleteStore::new(self.db.connection()).list_ids()?;
        let mut total = 0usize;

        for athlete_id in athlete_ids {
            match self.drain(athlete_id, batch_size) {
                Ok(processed) => total += processed,
                Err(err) => {
                    tracing::error!(
                        athlete_id,
                        error = %err,
                        "failed to drain athlete queue, continuing"
                    );
                }
            }
        }

        Ok(total)
    }
}
