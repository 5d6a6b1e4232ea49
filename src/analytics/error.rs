//! Analytics error types.

use thiserror::Error;

use crate::storage::DatabaseError;

/// Errors that can occur while processing activity analytics.
///
/// Missing stream data is deliberately NOT an error: `process` reports it
/// as `Ok(false)` so callers can retry once streams arrive. Short sample
/// arrays are not errors either; each metric defines its own zero/None
/// result.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The activity summary does not exist.
    #[error("Unknown activity: {0}")]
    UnknownActivity(i64),

    /// The athlete row does not exist.
    #[error("Unknown athlete: {0}")]
    UnknownAthlete(i64),

    /// Persistence failure; propagated so the scheduler can isolate it.
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_activity_message() {
        let err = AnalyticsError::UnknownActivity(42);
        assert!(err.to_string().contains("42"));
    }
}
