//! iotstream - interval aggregator and predictor for IoT sensor streams.
//!
//! Sensor readings arrive on a Kafka topic as text lines. Every reporting
//! interval, all lines received during that interval are collapsed into one
//! feature vector (the latest value per sensor), a pre-trained logistic
//! regression model is evaluated on it, and a status line is printed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         iotstream                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │ KafkaSource │──▶│  Batching   │──▶│ Aggregator  │        │
//! │  │  (thread)   │   │ (intervals) │   │  (vector)   │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                                             │               │
//! │  ┌─────────────┐   ┌─────────────┐          ▼               │
//! │  │   Storage   │──▶│    Model    │──▶  status line          │
//! │  │ (S3 / path) │   │    (LR)     │                          │
//! │  └─────────────┘   └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use iotstream::core::{IntervalAggregator, IntervalOutcome, LogisticRegressionModel};
//!
//! let model = LogisticRegressionModel::new(vec![4.0, 0.0, 0.0], -2.0);
//! let mut aggregator = IntervalAggregator::new(3, model);
//!
//! let outcome = aggregator
//!     .process_interval(&["2018-01-01T00:00:00.000Z,1,Sensor 1,0.9"])
//!     .unwrap();
//! assert!(matches!(outcome, IntervalOutcome::Evaluated { alert: true, .. }));
//! assert_eq!(aggregator.features(), &[0.9, 0.5, 0.5]);
//! ```

pub mod config;
pub mod core;
pub mod source;
pub mod storage;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    Classifier, IntervalAggregator, IntervalBatcher, IntervalCounters, IntervalOutcome,
    LogisticRegressionModel, StreamEnd, ThroughputSummary,
};
pub use source::{KafkaSource, KafkaSourceConfig, SensorReading};
pub use storage::{BlockingModelStore, ModelLocation, ModelStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Usage line printed when the positional arguments are wrong.
pub const USAGE: &str = "Usage: iotstream n_sensors reporting_interval kafka_server_list kafka_topic HDFS_or_S3 HDFS_path_or_S3_bucket modelname";
