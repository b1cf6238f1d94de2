//! Kafka-backed message source.
//!
//! A background thread polls a Kafka consumer and forwards each record's
//! payload, as one text line, into a bounded channel. The receiving side is
//! cut into intervals by [`crate::core::IntervalBatcher`].

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::Message;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a single consumer poll blocks before re-checking the running flag.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for the Kafka consumer.
#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    /// Comma-separated bootstrap server list
    pub brokers: String,
    /// Topic to subscribe to
    pub topic: String,
    /// Consumer group id
    pub group_id: String,
    /// Client id reported to the brokers
    pub client_id: String,
    /// Where to start when the group has no committed offset
    pub auto_offset_reset: String,
    /// Additional librdkafka properties
    pub extra: BTreeMap<String, String>,
    /// Capacity of the line channel
    pub channel_capacity: usize,
}

impl KafkaSourceConfig {
    /// Build the librdkafka client configuration.
    pub fn client_config(&self) -> ClientConfig {
        let mut kafka_conf = ClientConfig::new();
        kafka_conf
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("client.id", &self.client_id)
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.partition.eof", "false");
        for (k, v) in &self.extra {
            kafka_conf.set(k, v);
        }
        kafka_conf
    }
}

/// Errors that can occur while setting up the source.
#[derive(Debug)]
pub enum SourceError {
    /// The consumer could not be created
    Create(String),
    /// Subscribing to the topic failed
    Subscribe(String),
    /// The consumer thread could not be spawned
    Spawn(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Create(e) => write!(f, "Failed to create Kafka consumer: {e}"),
            SourceError::Subscribe(e) => write!(f, "Failed to subscribe to topic: {e}"),
            SourceError::Spawn(e) => write!(f, "Failed to spawn consumer thread: {e}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Consumes a Kafka topic on a background thread.
pub struct KafkaSource {
    receiver: Receiver<String>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KafkaSource {
    /// Connect to the brokers, subscribe to the topic and start forwarding
    /// record payloads.
    pub fn start(config: &KafkaSourceConfig) -> Result<Self, SourceError> {
        let consumer: BaseConsumer = config
            .client_config()
            .create()
            .map_err(|e| SourceError::Create(e.to_string()))?;
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| SourceError::Subscribe(e.to_string()))?;

        let (sender, receiver) = bounded(config.channel_capacity);
        let running = Arc::new(AtomicBool::new(true));

        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("kafka-source".to_string())
            .spawn(move || poll_loop(consumer, sender, thread_running))
            .map_err(|e| SourceError::Spawn(e.to_string()))?;

        tracing::info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "Kafka source started"
        );

        Ok(Self {
            receiver,
            running,
            handle: Some(handle),
        })
    }

    /// Get the receiver for raw message lines.
    pub fn receiver(&self) -> &Receiver<String> {
        &self.receiver
    }

    /// Stop consuming and wait for the consumer thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Kafka consumer thread panicked");
            }
        }
    }
}

impl Drop for KafkaSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(consumer: BaseConsumer, sender: Sender<String>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        let line = match consumer.poll(POLL_TIMEOUT) {
            None => continue,
            Some(Err(e)) => {
                tracing::warn!("Kafka error: {e}");
                continue;
            }
            Some(Ok(msg)) => match msg.payload_view::<str>() {
                Some(Ok(payload)) => payload.trim_end_matches(&['\r', '\n'][..]).to_string(),
                Some(Err(_)) => {
                    tracing::debug!(offset = msg.offset(), "Skipping non-UTF-8 payload");
                    continue;
                }
                None => continue,
            },
        };

        if !forward(&sender, line, &running) {
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    tracing::debug!("Kafka consumer thread exiting");
}

/// Push a line into the channel, backing off while it is full.
///
/// Returns `false` once the receiver is gone or the source was stopped.
fn forward(sender: &Sender<String>, mut line: String, running: &AtomicBool) -> bool {
    loop {
        match sender.send_timeout(line, POLL_TIMEOUT) {
            Ok(()) => return true,
            Err(SendTimeoutError::Disconnected(_)) => return false,
            Err(SendTimeoutError::Timeout(returned)) => {
                if !running.load(Ordering::SeqCst) {
                    return false;
                }
                line = returned;
            }
        }
    }
}
