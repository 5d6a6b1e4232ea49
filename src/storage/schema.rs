//! Database schema definitions for Paceline.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Athletes table (profile + detection baseline)
CREATE TABLE IF NOT EXISTS athletes (
    id INTEGER PRIMARY KEY,
    firstname TEXT,
    lastname TEXT,
    manual_ftp INTEGER,
    manual_ftp_effective_at TEXT,
    manual_max_hr INTEGER,
    detected_ftp INTEGER,
    detected_ftp_source_activity INTEGER,
    detected_ftp_at TEXT,
    detected_max_hr INTEGER,
    detected_max_hr_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Activities table (summaries owned by ingestion)
CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY,
    athlete_id INTEGER NOT NULL REFERENCES athletes(id) ON DELETE CASCADE,
    name TEXT,
    kind TEXT NOT NULL,
    start_date TEXT NOT NULL,
    needs_recalculation INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activities_athlete_date ON activities(athlete_id, start_date);
CREATE INDEX IF NOT EXISTS idx_activities_recalc ON activities(athlete_id, needs_recalculation);

-- Activity streams table (aligned sample arrays, one JSON array per series)
CREATE TABLE IF NOT EXISTS activity_streams (
    activity_id INTEGER PRIMARY KEY REFERENCES activities(id) ON DELETE CASCADE,
    time_json TEXT,
    watts_json TEXT,
    heartrate_json TEXT,
    cadence_json TEXT,
    altitude_json TEXT,
    temp_json TEXT,
    updated_at TEXT NOT NULL
);

-- Activity analytics table (derived, one row per activity)
CREATE TABLE IF NOT EXISTS activity_analytics (
    activity_id INTEGER PRIMARY KEY REFERENCES activities(id) ON DELETE CASCADE,
    peak_power_5s INTEGER,
    peak_power_1m INTEGER,
    peak_power_5m INTEGER,
    peak_power_20m INTEGER,
    peak_hr_5s INTEGER,
    peak_hr_1m INTEGER,
    peak_hr_5m INTEGER,
    peak_hr_20m INTEGER,
    weighted_power INTEGER NOT NULL,
    ride_ftp INTEGER,
    baseline_ftp INTEGER NOT NULL,
    max_heartrate INTEGER,
    max_vam INTEGER NOT NULL,
    aerobic_decoupling REAL,
    variability_index REAL NOT NULL,
    efficiency_factor REAL NOT NULL,
    intensity_score REAL NOT NULL,
    training_stress_score REAL NOT NULL,
    duration_seconds INTEGER NOT NULL,
    power_curve_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Daily fitness ledger (CTL/ATL/TSB per athlete-day)
CREATE TABLE IF NOT EXISTS athlete_daily_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    athlete_id INTEGER NOT NULL REFERENCES athletes(id) ON DELETE CASCADE,
    day TEXT NOT NULL,
    tss REAL NOT NULL,
    ctl REAL NOT NULL,
    atl REAL NOT NULL,
    tsb REAL NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(athlete_id, day)
);

CREATE INDEX IF NOT EXISTS idx_daily_metrics_athlete_day ON athlete_daily_metrics(athlete_id, day);
"#;

/// SQL for schema version tracking (migrations)
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;
