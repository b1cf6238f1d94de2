//! Core functionality for the interval predictor.
//!
//! This module contains:
//! - Batching of the message stream into fixed-length intervals
//! - Aggregation of each interval into the feature vector
//! - The classifier evaluated on that vector
//! - Status and summary reporting
//! - The interval loop tying them together

pub mod aggregator;
pub mod batching;
pub mod model;
pub mod report;
pub mod stream;

// Re-export commonly used types
pub use aggregator::{
    AggregateError, IntervalAggregator, IntervalCounters, IntervalOutcome, NEUTRAL_SENSOR_VALUE,
};
pub use batching::{BatchError, IntervalBatcher};
pub use model::{Classifier, LogisticRegressionModel, ModelError, DEFAULT_THRESHOLD};
pub use report::{
    banner, format_timestamp, status_line, ThroughputSummary, DEFAULT_SHUTDOWN_ALLOWANCE,
};
pub use stream::{stream_intervals, StreamEnd, StreamError};
