//! Athlete profile and baseline storage operations.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::analytics::types::AthleteBaseline;
use crate::storage::database::{parse_timestamp, DatabaseError};

/// Store for athlete rows and their detection baselines.
pub struct AthleteStore<'a> {
    conn: &'a Connection,
}

impl<'a> AthleteStore<'a> {
    /// Create a new athlete store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or update an athlete's profile fields. Baseline columns are
    /// left untouched on update.
    pub fn upsert_profile(
        &self,
        athlete_id: i64,
        firstname: Option<&str>,
        lastname: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO athletes (id, firstname, lastname, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    firstname = excluded.firstname,
                    lastname = excluded.lastname,
                    updated_at = excluded.updated_at
                "#,
                params![athlete_id, firstname, lastname, now],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// List all athlete IDs.
    pub fn list_ids(&self) -> Result<Vec<i64>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM athletes ORDER BY id")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?);
        }

        Ok(ids)
    }

    /// Load an athlete's baseline.
    pub fn get_baseline(&self, athlete_id: i64) -> Result<AthleteBaseline, DatabaseError> {
        let result = self.conn.query_row(
            "SELECT manual_ftp, manual_ftp_effective_at, manual_max_hr,
                    detected_ftp, detected_ftp_source_activity, detected_ftp_at,
                    detected_max_hr, detected_max_hr_at
             FROM athletes WHERE id = ?1",
            params![athlete_id],
            |row| {
                Ok(BaselineRow {
                    manual_ftp: row.get(0)?,
                    manual_ftp_effective_at: row.get(1)?,
                    manual_max_hr: row.get(2)?,
                    detected_ftp: row.get(3)?,
                    detected_ftp_source_activity: row.get(4)?,
                    detected_ftp_at: row.get(5)?,
                    detected_max_hr: row.get(6)?,
                    detected_max_hr_at: row.get(7)?,
                })
            },
        );

        match result {
            Ok(row) => row.into_baseline(),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(DatabaseError::NotFound(format!(
                "Athlete {}",
                athlete_id
            ))),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Persist an athlete's baseline.
    pub fn save_baseline(
        &self,
        athlete_id: i64,
        baseline: &AthleteBaseline,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        let rows_affected = self
            .conn
            .execute(
                "UPDATE athletes SET
                    manual_ftp = ?2,
                    manual_ftp_effective_at = ?3,
                    manual_max_hr = ?4,
                    detected_ftp = ?5,
                    detected_ftp_source_activity = ?6,
                    detected_ftp_at = ?7,
                    detected_max_hr = ?8,
                    detected_max_hr_at = ?9,
                    updated_at = ?10
                 WHERE id = ?1",
                params![
                    athlete_id,
                    baseline.manual_ftp,
                    baseline.manual_ftp_effective_at.map(|dt| dt.to_rfc3339()),
                    baseline.manual_max_hr,
                    baseline.detected_ftp,
                    baseline.detected_ftp_source_activity,
                    baseline.detected_ftp_at.map(|dt| dt.to_rfc3339()),
                    baseline.detected_max_hr,
                    baseline.detected_max_hr_at.map(|dt| dt.to_rfc3339()),
                    now,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Athlete {}", athlete_id)));
        }

        Ok(())
    }
}

/// Intermediate struct for reading baseline rows from database.
struct BaselineRow {
    manual_ftp: Option<u16>,
    manual_ftp_effective_at: Option<String>,
    manual_max_hr: Option<u16>,
    detected_ftp: Option<u16>,
    detected_ftp_source_activity: Option<i64>,
    detected_ftp_at: Option<String>,
    detected_max_hr: Option<u16>,
    detected_max_hr_at: Option<String>,
}

impl BaselineRow {
    fn into_baseline(self) -> Result<AthleteBaseline, DatabaseError> {
        let manual_ftp_effective_at = self
            .manual_ftp_effective_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let detected_ftp_at = self
            .detected_ftp_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let detected_max_hr_at = self
            .detected_max_hr_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(AthleteBaseline {
            manual_ftp: self.manual_ftp,
            manual_ftp_effective_at,
            manual_max_hr: self.manual_max_hr,
            detected_ftp: self.detected_ftp,
            detected_ftp_source_activity: self.detected_ftp_source_activity,
            detected_ftp_at,
            detected_max_hr: self.detected_max_hr,
            detected_max_hr_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;
    use chrono::TimeZone;

    #[test]
    fn test_fresh_athlete_has_empty_baseline() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = AthleteStore::new(db.connection());

        store
            .upsert_profile(1, Some("Ada"), None)
            .expect("Failed to insert");

        let baseline = store.get_baseline(1).expect("Failed to load");
        assert_eq!(baseline, AthleteBaseline::default());
    }

    #[test]
    fn test_baseline_roundtrip() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = AthleteStore::new(db.connection());
        store
            .upsert_profile(1, Some("Ada"), None)
            .expect("Failed to insert");

        let baseline = AthleteBaseline {
            manual_ftp: Some(250),
            manual_ftp_effective_at: Some(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            manual_max_hr: Some(190),
            detected_ftp: Some(235),
            detected_ftp_source_activity: Some(42),
            detected_ftp_at: Some(chrono::Utc.with_ymd_and_hms(2023, 11, 5, 8, 30, 0).unwrap()),
            detected_max_hr: Some(188),
            detected_max_hr_at: Some(chrono::Utc.with_ymd_and_hms(2023, 11, 5, 8, 30, 0).unwrap()),
        };

        store.save_baseline(1, &baseline).expect("Failed to save");
        let loaded = store.get_baseline(1).expect("Failed to load");
        assert_eq!(loaded, baseline);
    }

    #[test]
    fn test_unknown_athlete_is_not_found() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = AthleteStore::new(db.connection());
        assert!(matches!(
            store.get_baseline(99),
            Err(DatabaseError::NotFound(_))
        ));
    }

    #[test]
    fn test_profile_update_keeps_baseline() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = AthleteStore::new(db.connection());
        store
            .upsert_profile(1, Some("Ada"), None)
            .expect("Failed to insert");

        let baseline = AthleteBaseline {
            detected_ftp: Some(240),
            ..Default::default()
        };
        store.save_baseline(1, &baseline).expect("Failed to save");

        // Re-running ingestion must not wipe detection state.
        store
            .upsert_profile(1, Some("Ada"), Some("Lovelace"))
            .expect("Failed to update");
        let loaded = store.get_baseline(1).expect("Failed to load");
        assert_eq!(loaded.detected_ftp, Some(240));
    }
}
