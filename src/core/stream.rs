//! The interval loop: batch, aggregate, report.

use crate::core::aggregator::{AggregateError, IntervalAggregator};
use crate::core::batching::{BatchError, IntervalBatcher};
use crate::core::model::Classifier;
use crate::core::report::status_line;
use chrono::Utc;
use crossbeam_channel::Receiver;
use std::io::Write;
use std::sync::atomic::AtomicBool;

/// Why the interval loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// An interval carried the end-of-stream sentinel
    Terminal,
    /// The running flag was cleared
    Stopped,
}

/// Errors that abort the interval loop.
#[derive(Debug)]
pub enum StreamError {
    /// The message source went away
    Batch(BatchError),
    /// An interval could not be aggregated
    Aggregate(AggregateError),
    /// A status line could not be written
    Output(std::io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::Batch(e) => write!(f, "{e}"),
            StreamError::Aggregate(e) => write!(f, "{e}"),
            StreamError::Output(e) => write!(f, "Failed to write status line: {e}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Batch(e) => Some(e),
            StreamError::Aggregate(e) => Some(e),
            StreamError::Output(e) => Some(e),
        }
    }
}

impl From<BatchError> for StreamError {
    fn from(e: BatchError) -> Self {
        StreamError::Batch(e)
    }
}

impl From<AggregateError> for StreamError {
    fn from(e: AggregateError) -> Self {
        StreamError::Aggregate(e)
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        StreamError::Output(e)
    }
}

/// Process intervals until a terminal sentinel arrives or `running` is cleared.
///
/// One status line per interval is written to `out`. Nothing queued after the
/// terminal interval is read.
pub fn stream_intervals<C: Classifier, W: Write>(
    aggregator: &mut IntervalAggregator<C>,
    batcher: &mut IntervalBatcher,
    receiver: &Receiver<String>,
    running: &AtomicBool,
    out: &mut W,
) -> Result<StreamEnd, StreamError> {
    while let Some(batch) = batcher.next_batch(receiver, running)? {
        let outcome = aggregator.process_interval(batch.as_slice())?;
        writeln!(out, "{}", status_line(Utc::now(), &outcome))?;

        if outcome.is_terminal() {
            tracing::info!("End-of-stream sentinel received");
            return Ok(StreamEnd::Terminal);
        }
    }

    tracing::info!("Stopped by signal");
    Ok(StreamEnd::Stopped)
}
