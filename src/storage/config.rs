//! Application configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for the analytics core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    /// How far back detection queries look, and how old a detection may be
    /// before it is considered stale (days).
    pub ftp_lookback_days: i64,
    /// Fallback FTP when an athlete has no baseline at all (watts).
    pub default_ftp: u16,
    /// Fallback max heart rate (bpm).
    pub default_max_hr: u16,
    /// Activities recomputed per athlete per scheduler pass.
    pub recalc_batch_size: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            ftp_lookback_days: 90,
            default_ftp: 200,
            default_max_hr: 185,
            recalc_batch_size: 50,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database file path; defaults to `paceline.db` in the data directory.
    pub database_path: Option<PathBuf>,
    /// Analytics tunables.
    pub analytics: AnalyticsSettings,
}

impl AppConfig {
    /// Resolve the effective database path.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| get_data_dir().join("paceline.db"))
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "paceline", "Paceline")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from file, falling back to defaults when
/// no config file exists yet.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load application configuration from an explicit path.
pub fn load_config_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Save application configuration to file.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = get_config_path();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = AnalyticsSettings::default();
        assert_eq!(settings.ftp_lookback_days, 90);
        assert_eq!(settings.default_ftp, 200);
        assert_eq!(settings.default_max_hr, 185);
        assert_eq!(settings.recalc_batch_size, 50);
    }

    #[test]
    fn test_load_partial_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "[analytics]\nftp_lookback_days = 42").expect("Failed to write");

        let config = load_config_from(file.path()).expect("Failed to load");
        assert_eq!(config.analytics.ftp_lookback_days, 42);
        // Unspecified fields keep their defaults.
        assert_eq!(config.analytics.default_ftp, 200);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config =
            load_config_from(std::path::Path::new("/nonexistent/paceline.toml")).expect("defaults");
        assert_eq!(config.analytics.recalc_batch_size, 50);
    }
}
