//! Configuration for the interval predictor.
//!
//! Everything the command line does not cover lives in an optional JSON file.
//! A missing file yields the defaults.

use crate::core::DEFAULT_SHUTDOWN_ALLOWANCE;
use crate::source::KafkaSourceConfig;
use crate::storage::S3Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Kafka consumer group; a random one is generated when unset
    pub group_id: Option<String>,

    /// Where to start reading when the group has no committed offset
    pub auto_offset_reset: String,

    /// Additional librdkafka properties
    pub kafka: BTreeMap<String, String>,

    /// Time set aside for shutdown when computing throughput
    #[serde(with = "duration_secs_f64", rename = "shutdown_allowance_secs")]
    pub shutdown_allowance: Duration,

    /// Capacity of the channel between the consumer thread and the batcher
    pub channel_capacity: usize,

    /// AWS region used for S3 model storage
    pub s3_region: Option<String>,

    /// Custom S3 endpoint (e.g. MinIO)
    pub s3_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_id: None,
            auto_offset_reset: "latest".to_string(),
            kafka: BTreeMap::new(),
            shutdown_allowance: DEFAULT_SHUTDOWN_ALLOWANCE,
            channel_capacity: 10_000,
            s3_region: None,
            s3_endpoint: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("iotstream")
            .join("config.json")
    }

    /// Reject values that cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Consumer group id, generating a unique one when none is configured.
    pub fn resolve_group_id(&self) -> String {
        self.group_id.clone().unwrap_or_else(|| {
            format!("iotstream-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
        })
    }

    /// Consumer settings for `topic` on `brokers`.
    pub fn kafka_source(&self, brokers: &str, topic: &str) -> KafkaSourceConfig {
        KafkaSourceConfig {
            brokers: brokers.to_string(),
            topic: topic.to_string(),
            group_id: self.resolve_group_id(),
            client_id: Self::client_id(),
            auto_offset_reset: self.auto_offset_reset.clone(),
            extra: self.kafka.clone(),
            channel_capacity: self.channel_capacity,
        }
    }

    /// S3 connection settings for model storage.
    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            region: self.s3_region.clone(),
            endpoint: self.s3_endpoint.clone(),
        }
    }

    /// Client id reported to the Kafka brokers.
    pub fn client_id() -> String {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        format!("iotstream-{hostname}")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for fractional-second durations.
mod duration_secs_f64 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.auto_offset_reset, "latest");
        assert_eq!(config.shutdown_allowance, Duration::from_millis(1500));
        assert_eq!(config.channel_capacity, 10_000);
        assert!(config.group_id.is_none());
        assert!(config.kafka.is_empty());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"group_id": "spark-demo", "shutdown_allowance_secs": 0.25, "kafka": {"security.protocol": "SSL"}}"#,
        )
        .unwrap();
        assert_eq!(config.group_id.as_deref(), Some("spark-demo"));
        assert_eq!(config.shutdown_allowance, Duration::from_millis(250));
        assert_eq!(config.kafka.get("security.protocol").map(String::as_str), Some("SSL"));
        assert_eq!(config.auto_offset_reset, "latest");
    }

    #[test]
    fn test_negative_allowance_rejected() {
        let result = serde_json::from_str::<Config>(r#"{"shutdown_allowance_secs": -1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("iotstream-config-does-not-exist.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.channel_capacity, 10_000);
    }

    #[test]
    fn test_load_rejects_zero_capacity() {
        let path = std::env::temp_dir().join(format!("iotstream-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"channel_capacity": 0}"#).unwrap();
        let result = Config::load_from(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_kafka_source_settings() {
        let mut config = Config::default();
        config.group_id = Some("sensors".to_string());
        config.kafka.insert("fetch.min.bytes".to_string(), "1".to_string());

        let source = config.kafka_source("broker:9092", "iot");
        assert_eq!(source.brokers, "broker:9092");
        assert_eq!(source.topic, "iot");
        assert_eq!(source.group_id, "sensors");
        assert!(source.client_id.starts_with("iotstream-"));
        assert_eq!(source.extra.len(), 1);
        assert_eq!(source.channel_capacity, config.channel_capacity);
    }

    #[test]
    fn test_generated_group_id() {
        let config = Config::default();
        let group_id = config.resolve_group_id();
        assert!(group_id.starts_with("iotstream-"));
        assert_eq!(group_id.len(), "iotstream-".len() + 8);

        let config = Config {
            group_id: Some("fixed".to_string()),
            ..Config::default()
        };
        assert_eq!(config.resolve_group_id(), "fixed");
    }
}
