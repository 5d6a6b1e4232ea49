//! Activity analytics: processing, baseline resolution, invalidation and
//! aggregation.

pub mod aggregator;
pub mod baseline;
pub mod error;
pub mod invalidation;
pub mod processor;
pub mod scheduler;
pub mod types;

pub use aggregator::{PowerCurveAggregator, SeasonalPoint, SeasonalSeries};
pub use baseline::{
    BaselineHistory, BaselineOutcome, BaselineResolver, HistoricalBest, HistoryWindow,
    RedetectReason, Resolution, RideObservation,
};
pub use error::{AnalyticsError, AnalyticsResult};
pub use invalidation::InvalidationCascade;
pub use processor::ActivityAnalyticsProcessor;
pub use scheduler::RecalculationScheduler;
pub use types::{
    Activity, AnalyticsRecord, AthleteBaseline, PeakWindow, StreamSet, ANALYTICS_KINDS,
};
