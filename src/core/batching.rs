//! Micro-batching of a line stream into fixed-length intervals.
//!
//! The batcher delivers, once per interval, every line received during that
//! interval. Delivery is serialized: the caller processes one batch before
//! asking for the next, so the aggregator never sees overlapping intervals.
//!
//! The schedule is fixed-rate. If the caller falls behind, every missed
//! deadline is still delivered, as an empty batch once the queue is drained,
//! so each elapsed interval is accounted for exactly once.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Upper bound on how long the batcher blocks without checking the running flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that end batching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The sending side of the channel is gone
    SourceDisconnected,
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::SourceDisconnected => write!(f, "Message source disconnected"),
        }
    }
}

impl std::error::Error for BatchError {}

/// Cuts a channel of lines into fixed-length intervals.
pub struct IntervalBatcher {
    /// Length of each interval
    interval: Duration,
    /// End of the interval currently being filled
    deadline: Instant,
    /// Set while delivering intervals whose deadline already passed
    catching_up: bool,
}

impl IntervalBatcher {
    /// Create a batcher whose first interval starts now.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    /// Create a batcher whose first interval starts at `start`.
    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            deadline: start + interval,
            catching_up: false,
        }
    }

    /// Block until the current interval ends and return its lines.
    ///
    /// Returns `Ok(None)` once `running` is cleared; lines collected for the
    /// unfinished interval are dropped.
    pub fn next_batch(
        &mut self,
        receiver: &Receiver<String>,
        running: &AtomicBool,
    ) -> Result<Option<Vec<String>>, BatchError> {
        let mut batch = Vec::new();

        loop {
            if !running.load(Ordering::SeqCst) {
                return Ok(None);
            }

            let now = Instant::now();
            if now >= self.deadline {
                // Lines that arrived after the last receive still belong here.
                batch.extend(receiver.try_iter());
                break;
            }

            let wake = self.deadline.min(now + STOP_CHECK_INTERVAL);
            match receiver.recv_deadline(wake) {
                Ok(line) => {
                    batch.push(line);
                    // Drain whatever is already queued without re-checking the clock per line.
                    batch.extend(receiver.try_iter());
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(BatchError::SourceDisconnected),
            }
        }

        self.advance(Instant::now());
        Ok(Some(batch))
    }

    /// Move the deadline to the end of the next interval.
    fn advance(&mut self, now: Instant) {
        self.deadline += self.interval;
        if self.deadline > now {
            self.catching_up = false;
            return;
        }

        if !self.catching_up {
            let behind = now.saturating_duration_since(self.deadline);
            let missed = behind.as_nanos() / self.interval.as_nanos().max(1) + 1;
            tracing::warn!(
                missed = missed as u64,
                "Interval processing overran; delivering missed intervals"
            );
            self.catching_up = true;
        }
    }
}
