//! Stale-range invalidation for history changes.
//!
//! Whenever an athlete's history changes behind already-processed
//! activities (backfill, edit, delete), everything from the change point
//! forward is flagged for recalculation. The flagging is deliberately
//! coarse: over-invalidating costs a few redundant recomputes, while
//! under-invalidating leaves stale baselines in persisted records.

use chrono::{DateTime, Duration, Utc};

use crate::analytics::types::Activity;
use crate::storage::{ActivityStore, Database, DatabaseError};

/// Forward invalidation of an athlete's processed history.
pub struct InvalidationCascade<'a> {
    db: &'a Database,
}

impl<'a> InvalidationCascade<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Flag every activity of the athlete dated at or after `from`.
    /// Returns the number of activities flagged.
    pub fn invalidate_forward(
        &self,
        athlete_id: i64,
        from: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let flagged =
            ActivityStore::new(self.db.connection()).mark_for_recalc_from(athlete_id, from)?;

        tracing::info!(
            athlete_id,
            from = %from,
            flagged,
            "invalidated forward history"
        );

        Ok(flagged)
    }

    /// Historical activities were inserted. Invalidate from one day before
    /// the earliest insert as a safety margin for baseline recompute.
    pub fn after_backfill(
        &self,
        athlete_id: i64,
        earliest_inserted: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        self.invalidate_forward(athlete_id, earliest_inserted - Duration::days(1))
    }

    /// An activity was edited in place.
    pub fn after_edit(&self, activity: &Activity) -> Result<usize, DatabaseError> {
        self.invalidate_forward(activity.athlete_id, activity.start_date)
    }

    /// An activity was deleted; `start_date` is the deleted activity's own
    /// date (captured before the delete).
    pub fn after_delete(
        &self,
        athlete_id: i64,
        start_date: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        self.invalidate_forward(athlete_id, start_date)
    }
}
