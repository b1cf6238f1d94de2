//! Message sources for the interval aggregator.
//!
//! This module provides the raw message format and the Kafka consumer that
//! delivers message lines to the batching stage.

pub mod kafka;
pub mod types;

// Re-export commonly used types
pub use kafka::{KafkaSource, KafkaSourceConfig, SourceError};
pub use types::{ParseError, SensorReading, FIELD_COUNT};
