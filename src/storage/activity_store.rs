//! Activity summary storage operations.
//!
//! Activities are owned by the ingestion side; this store reads them,
//! mirrors ingestion writes for tests and local tooling, and manages the
//! recalculation flag the scheduler drains.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::analytics::types::{Activity, ANALYTICS_KINDS};
use crate::storage::database::{parse_timestamp, DatabaseError};

/// Store for activity summaries and their recalculation flags.
pub struct ActivityStore<'a> {
    conn: &'a Connection,
}

impl<'a> ActivityStore<'a> {
    /// Create a new activity store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or update an activity summary.
    pub fn upsert(&self, activity: &Activity) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO activities (id, athlete_id, name, kind, start_date,
                 needs_recalculation, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    athlete_id = excluded.athlete_id,
                    name = excluded.name,
                    kind = excluded.kind,
                    start_date = excluded.start_date,
                    updated_at = excluded.updated_at
                "#,
                params![
                    activity.id,
                    activity.athlete_id,
                    activity.name,
                    activity.kind,
                    activity.start_date.to_rfc3339(),
                    activity.needs_recalculation as i32,
                    now,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get an activity by ID.
    pub fn get(&self, id: i64) -> Result<Option<Activity>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, athlete_id, name, kind, start_date, needs_recalculation
                 FROM activities WHERE id = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![id], |row| {
            Ok(ActivityRow {
                id: row.get(0)?,
                athlete_id: row.get(1)?,
                name: row.get(2)?,
                kind: row.get(3)?,
                start_date: row.get(4)?,
                needs_recalculation: row.get(5)?,
            })
        });

        match result {
            Ok(row) => Ok(Some(row.into_activity()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// List an athlete's activities in ascending start-date order.
    pub fn list_for_athlete(&self, athlete_id: i64) -> Result<Vec<Activity>, DatabaseError> {
        self.list_ordered(athlete_id, "ASC")
    }

    /// List an athlete's activities newest first.
    pub fn list_for_athlete_desc(&self, athlete_id: i64) -> Result<Vec<Activity>, DatabaseError> {
        self.list_ordered(athlete_id, "DESC")
    }

    fn list_ordered(&self, athlete_id: i64, order: &str) -> Result<Vec<Activity>, DatabaseError> {
        let sql = format!(
            "SELECT id, athlete_id, name, kind, start_date, needs_recalculation
             FROM activities WHERE athlete_id = ?1 ORDER BY start_date {}",
            order
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![athlete_id], |row| {
                Ok(ActivityRow {
                    id: row.get(0)?,
                    athlete_id: row.get(1)?,
                    name: row.get(2)?,
                    kind: row.get(3)?,
                    start_date: row.get(4)?,
                    needs_recalculation: row.get(5)?,
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut activities = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            activities.push(row.into_activity()?);
        }

        Ok(activities)
    }

    /// Delete an activity by ID (cascades to streams and analytics).
    pub fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM activities WHERE id = ?1", params![id])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Activity {}", id)));
        }

        Ok(())
    }

    // ========== Recalculation flag ==========

    /// Flag every activity of the athlete dated at or after `from`.
    /// Returns the number of activities flagged.
    pub fn mark_for_recalc_from(
        &self,
        athlete_id: i64,
        from: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        self.conn
            .execute(
                "UPDATE activities SET needs_recalculation = 1
                 WHERE athlete_id = ?1 AND start_date >= ?2",
                params![athlete_id, from.to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    /// Clear the recalculation flag after successful reprocessing.
    pub fn clear_recalc_flag(&self, id: i64) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE activities SET needs_recalculation = 0 WHERE id = ?1",
                params![id],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Fetch the oldest flagged analytics-eligible activities, up to
    /// `limit`. Ascending order is load-bearing: baseline resolution
    /// assumes everything earlier-dated was processed first.
    pub fn flagged_batch(
        &self,
        athlete_id: i64,
        limit: usize,
    ) -> Result<Vec<Activity>, DatabaseError> {
        let kinds = ANALYTICS_KINDS
            .iter()
            .map(|k| format!("'{}'", k))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "SELECT id, athlete_id, name, kind, start_date, needs_recalculation
             FROM activities
             WHERE athlete_id = ?1 AND needs_recalculation = 1 AND kind IN ({})
             ORDER BY start_date ASC LIMIT ?2",
            kinds
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![athlete_id, limit as i64], |row| {
                Ok(ActivityRow {
                    id: row.get(0)?,
                    athlete_id: row.get(1)?,
                    name: row.get(2)?,
                    kind: row.get(3)?,
                    start_date: row.get(4)?,
                    needs_recalculation: row.get(5)?,
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut activities = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            activities.push(row.into_activity()?);
        }

        Ok(activities)
    }
}

/// Intermediate struct for reading activity rows from database.
struct ActivityRow {
    id: i64,
    athlete_id: i64,
    name: Option<String>,
    kind: String,
    start_date: String,
    needs_recalculation: i32,
}

impl ActivityRow {
    fn into_activity(self) -> Result<Activity, DatabaseError> {
        let start_date = parse_timestamp(&self.start_date)?;

        Ok(Activity {
            id: self.id,
            athlete_id: self.athlete_id,
            name: self.name,
            kind: self.kind,
            start_date,
            needs_recalculation: self.needs_recalculation != 0,
        })
    }
}
