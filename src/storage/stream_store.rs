//! Activity stream storage operations.
//!
//! Each series is stored as a JSON array in its own TEXT column; a NULL
//! column means the device did not record that series.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::analytics::types::StreamSet;
use crate::storage::database::DatabaseError;

/// Store for raw per-activity sample streams.
pub struct StreamStore<'a> {
    conn: &'a Connection,
}

impl<'a> StreamStore<'a> {
    /// Create a new stream store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Save or replace the streams for an activity.
    pub fn save(&self, activity_id: i64, streams: &StreamSet) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO activity_streams (activity_id, time_json, watts_json,
                 heartrate_json, cadence_json, altitude_json, temp_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(activity_id) DO UPDATE SET
                    time_json = excluded.time_json,
                    watts_json = excluded.watts_json,
                    heartrate_json = excluded.heartrate_json,
                    cadence_json = excluded.cadence_json,
                    altitude_json = excluded.altitude_json,
                    temp_json = excluded.temp_json,
                    updated_at = excluded.updated_at
                "#,
                params![
                    activity_id,
                    to_series_json(&streams.time)?,
                    to_series_json(&streams.watts)?,
                    to_series_json(&streams.heartrate)?,
                    to_series_json(&streams.cadence)?,
                    to_series_json(&streams.altitude)?,
                    to_series_json(&streams.temp)?,
                    now,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Load the streams for an activity, or None when never synced.
    pub fn get(&self, activity_id: i64) -> Result<Option<StreamSet>, DatabaseError> {
        let result = self.conn.query_row(
            "SELECT time_json, watts_json, heartrate_json, cadence_json,
                    altitude_json, temp_json
             FROM activity_streams WHERE activity_id = ?1",
            params![activity_id],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        );

        match result {
            Ok((time, watts, heartrate, cadence, altitude, temp)) => Ok(Some(StreamSet {
                time: from_series_json(time)?,
                watts: from_series_json(watts)?,
                heartrate: from_series_json(heartrate)?,
                cadence: from_series_json(cadence)?,
                altitude: from_series_json(altitude)?,
                temp: from_series_json(temp)?,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }
}

/// Serialize a series; empty series are stored as NULL.
fn to_series_json<T: Serialize>(series: &[T]) -> Result<Option<String>, DatabaseError> {
    if series.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(series)
        .map(Some)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))
}

/// Deserialize a series column; NULL becomes an empty series.
fn from_series_json<T: DeserializeOwned>(json: Option<String>) -> Result<Vec<T>, DatabaseError> {
    match json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| DatabaseError::DeserializationError(e.to_string())),
        None => Ok(Vec::new()),
    }
}
