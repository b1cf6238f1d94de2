//! Human-readable status lines and the end-of-run throughput summary.

use crate::core::aggregator::{IntervalCounters, IntervalOutcome};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Time set aside for stream shutdown when computing throughput.
pub const DEFAULT_SHUTDOWN_ALLOWANCE: Duration = Duration::from_millis(1500);

const ALERT_STYLE: &str = "\x1b[31m";
const RESET_STYLE: &str = "\x1b[0m";

/// Format a timestamp with millisecond precision, e.g. `2018-03-01T10:15:02.123Z`.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Startup line describing what is being analyzed.
pub fn banner(
    time: DateTime<Utc>,
    topic: &str,
    brokers: &str,
    model_uri: &str,
    interval: Duration,
) -> String {
    format!(
        "{}: Analyzing stream of input from kafka topic {} with kafka server(s) {}, using LR model {}, with {:.1} second intervals",
        format_timestamp(time),
        topic,
        brokers,
        model_uri,
        interval.as_secs_f64()
    )
}

/// Status line for one processed interval.
pub fn status_line(time: DateTime<Utc>, outcome: &IntervalOutcome) -> String {
    match *outcome {
        IntervalOutcome::NoInput => "No input".to_string(),
        IntervalOutcome::Evaluated {
            interval,
            messages,
            alert: true,
            ..
        } => format!(
            "{ALERT_STYLE}{}: Interval {}: Attention needed ({} sensor events in interval){RESET_STYLE}",
            format_timestamp(time),
            interval,
            messages
        ),
        IntervalOutcome::Evaluated {
            interval, messages, ..
        } => format!(
            "{}: Interval {}: Everything is OK ({} sensor events in interval)",
            format_timestamp(time),
            interval,
            messages
        ),
    }
}

/// Throughput statistics for a finished run.
#[derive(Debug, Clone)]
pub struct ThroughputSummary {
    /// When the summary was computed
    pub finished_at: DateTime<Utc>,
    /// Sensor events received, sentinels excluded
    pub events: u64,
    /// Processing time in seconds, idle intervals and shutdown excluded
    pub elapsed_secs: f64,
    /// Non-empty intervals processed
    pub intervals: u64,
    /// Events per second, zero when no processing time remains
    pub events_per_sec: f64,
}

impl ThroughputSummary {
    /// Compute the summary from the run counters.
    ///
    /// Processing time is the wall time since streaming started, minus one
    /// interval length per empty interval, minus the shutdown allowance.
    pub fn compute(
        counters: &IntervalCounters,
        wall_time: Duration,
        interval: Duration,
        shutdown_allowance: Duration,
    ) -> Self {
        let idle = interval.as_secs_f64() * counters.empty_intervals as f64;
        let elapsed_secs = wall_time.as_secs_f64() - idle - shutdown_allowance.as_secs_f64();
        let events = counters.sensor_events();
        let events_per_sec = if elapsed_secs > 0.0 {
            events as f64 / elapsed_secs
        } else {
            0.0
        };

        Self {
            finished_at: Utc::now(),
            events,
            elapsed_secs,
            intervals: counters.intervals,
            events_per_sec,
        }
    }
}

impl fmt::Display for ThroughputSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\n{}: {} events received in {:.1} seconds ({} intervals), or {:.0} sensor events/second\n",
            format_timestamp(self.finished_at),
            self.events,
            self.elapsed_secs,
            self.intervals,
            self.events_per_sec
        )
    }
}
