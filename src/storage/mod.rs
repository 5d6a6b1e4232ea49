//! Storage module for database and configuration.

pub mod activity_store;
pub mod analytics_store;
pub mod athlete_store;
pub mod config;
pub mod database;
pub mod fitness_store;
pub mod schema;
pub mod stream_store;

pub use activity_store::ActivityStore;
pub use analytics_store::AnalyticsStore;
pub use athlete_store::AthleteStore;
pub use config::{load_config, save_config, AnalyticsSettings, AppConfig, ConfigError};
pub use database::{Database, DatabaseError};
pub use fitness_store::FitnessStore;
pub use stream_store::StreamStore;
