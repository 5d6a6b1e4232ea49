//! Paceline - Cycling Performance Analytics Engine
//!
//! A self-hosted engine that derives per-workout performance metrics
//! (weighted power, peak-power windows, training stress, aerobic
//! efficiency) from raw sensor streams, and keeps each athlete's FTP /
//! max-heart-rate baseline causally consistent under out-of-order
//! backfill, manual overrides and edits of historical activities.

pub mod analytics;
pub mod engine;
pub mod fitness;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use analytics::baseline::BaselineResolver;
pub use analytics::processor::ActivityAnalyticsProcessor;
pub use analytics::scheduler::RecalculationScheduler;
pub use engine::AnalyticsEngine;
pub use storage::config::AppConfig;
