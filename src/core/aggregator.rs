//! Interval aggregation and prediction.
//!
//! All messages received in one interval are collapsed into a fixed-size
//! feature vector with last-known-value semantics per sensor, and the
//! classifier is evaluated on the result.
//!
//! [`IntervalAggregator::process_interval`] must be invoked serially, once per
//! interval. It takes `&mut self`, so the borrow checker enforces this for a
//! single owner.

use crate::core::model::Classifier;
use crate::source::types::SensorReading;

/// Value every sensor position starts with until it is first reported.
pub const NEUTRAL_SENSOR_VALUE: f64 = 0.5;

/// Counters accumulated over the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalCounters {
    /// Intervals with at least one message
    pub intervals: u64,
    /// Intervals with no messages at all
    pub empty_intervals: u64,
    /// Well-formed messages processed, sentinels included
    pub messages: u64,
    /// End-of-stream sentinels seen
    pub sentinels: u64,
}

impl IntervalCounters {
    /// Messages that carried an actual sensor value.
    pub fn sensor_events(&self) -> u64 {
        self.messages.saturating_sub(self.sentinels)
    }
}

/// Result of processing one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalOutcome {
    /// The interval delivered no messages; nothing was evaluated
    NoInput,
    /// The classifier was evaluated on the updated feature vector
    Evaluated {
        /// 1-based number of this interval
        interval: u64,
        /// Well-formed messages in this interval
        messages: usize,
        /// Classifier result
        alert: bool,
        /// A terminal sentinel was seen; the stream should stop
        terminal: bool,
    },
}

impl IntervalOutcome {
    /// Whether the stream should stop after this interval.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntervalOutcome::Evaluated { terminal: true, .. })
    }
}

/// Errors raised while aggregating an interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// A sensor id does not map to a position in the feature vector
    SensorOutOfRange { sensor_id: i64, n_sensors: usize },
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::SensorOutOfRange {
                sensor_id,
                n_sensors,
            } => write!(
                f,
                "Sensor id {sensor_id} is out of range for {n_sensors} sensors"
            ),
        }
    }
}

impl std::error::Error for AggregateError {}

/// Owns the feature vector, the run counters and the classifier.
pub struct IntervalAggregator<C> {
    features: Vec<f64>,
    counters: IntervalCounters,
    classifier: C,
}

impl<C: Classifier> IntervalAggregator<C> {
    /// Create an aggregator for `n_sensors` sensors, all starting at
    /// [`NEUTRAL_SENSOR_VALUE`].
    pub fn new(n_sensors: usize, classifier: C) -> Self {
        Self {
            features: vec![NEUTRAL_SENSOR_VALUE; n_sensors],
            counters: IntervalCounters::default(),
            classifier,
        }
    }

    /// Process every message line received during one interval.
    ///
    /// Malformed lines are dropped without affecting the vector or the
    /// counters. A sensor id outside `1..=n_sensors` (other than a negative
    /// sentinel) fails the whole interval before anything is written.
    pub fn process_interval<S: AsRef<str>>(
        &mut self,
        lines: &[S],
    ) -> Result<IntervalOutcome, AggregateError> {
        if lines.is_empty() {
            self.counters.empty_intervals += 1;
            return Ok(IntervalOutcome::NoInput);
        }

        let readings: Vec<SensorReading> = lines
            .iter()
            .filter_map(|line| SensorReading::parse(line.as_ref()))
            .collect();

        let mut updates = Vec::with_capacity(readings.len());
        let mut sentinels = 0u64;
        for reading in &readings {
            if reading.is_terminal() {
                sentinels += 1;
            } else {
                updates.push((self.position(reading.sensor_id)?, reading.value));
            }
        }

        for (index, value) in updates {
            self.features[index] = value;
        }

        self.counters.intervals += 1;
        self.counters.messages += readings.len() as u64;
        self.counters.sentinels += sentinels;

        let alert = self.classifier.predict(&self.features);

        Ok(IntervalOutcome::Evaluated {
            interval: self.counters.intervals,
            messages: readings.len(),
            alert,
            terminal: sentinels > 0,
        })
    }

    /// Current feature vector.
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    /// Counters accumulated so far.
    pub fn counters(&self) -> IntervalCounters {
        self.counters
    }

    /// The classifier evaluated on every non-empty interval.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Map a 1-based sensor id to its vector position.
    fn position(&self, sensor_id: i64) -> Result<usize, AggregateError> {
        let n_sensors = self.features.len();
        usize::try_from(sensor_id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .filter(|&index| index < n_sensors)
            .ok_or(AggregateError::SensorOutOfRange {
                sensor_id,
                n_sensors,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every vector it sees and answers with a fixed result.
    struct RecordingClassifier {
        answer: bool,
        seen: RefCell<Vec<Vec<f64>>>,
    }

    impl RecordingClassifier {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Classifier for RecordingClassifier {
        fn predict(&self, features: &[f64]) -> bool {
            self.seen.borrow_mut().push(features.to_vec());
            self.answer
        }
    }

    #[test]
    fn test_initial_vector_is_neutral() {
        let aggregator = IntervalAggregator::new(4, RecordingClassifier::new(false));
        assert_eq!(aggregator.features(), &[0.5, 0.5, 0.5, 0.5]);
        assert_eq!(aggregator.counters(), IntervalCounters::default());
    }

    #[test]
    fn test_reported_positions_are_overwritten() {
        let mut aggregator = IntervalAggregator::new(3, RecordingClassifier::new(false));
        let outcome = aggregator
            .process_interval(&["t,1,n,0.9", "t,2,n,0.1"])
            .unwrap();

        assert_eq!(aggregator.features(), &[0.9, 0.1, 0.5]);
        assert_eq!(
            outcome,
            IntervalOutcome::Evaluated {
                interval: 1,
                messages: 2,
                alert: false,
                terminal: false
            }
        );
        let counters = aggregator.counters();
        assert_eq!(counters.intervals, 1);
        assert_eq!(counters.messages, 2);
        assert_eq!(counters.empty_intervals, 0);
    }

    #[test]
    fn test_classifier_sees_updated_vector() {
        let mut aggregator = IntervalAggregator::new(2, RecordingClassifier::new(true));
        let outcome = aggregator.process_interval(&["t,2,n,0.7"]).unwrap();

        assert!(matches!(outcome, IntervalOutcome::Evaluated { alert: true, .. }));
        assert_eq!(aggregator.classifier().seen.borrow().as_slice(), &[vec![0.5, 0.7]]);
    }

    #[test]
    fn test_last_value_wins_within_interval() {
        let mut aggregator = IntervalAggregator::new(2, RecordingClassifier::new(false));
        aggregator
            .process_interval(&["t,1,n,0.2", "t,1,n,0.3", "t,1,n,0.4"])
            .unwrap();
        assert_eq!(aggregator.features(), &[0.4, 0.5]);
        assert_eq!(aggregator.counters().messages, 3);
    }

    #[test]
    fn test_values_are_sticky_across_intervals() {
        let mut aggregator = IntervalAggregator::new(3, RecordingClassifier::new(false));
        aggregator.process_interval(&["t,1,n,0.9"]).unwrap();
        aggregator.process_interval(&["t,3,n,0.2"]).unwrap();
        aggregator.process_interval(&["t,1,n,0.8"]).unwrap();

        // Sensor 2 was never reported and keeps the neutral value.
        assert_eq!(aggregator.features(), &[0.8, 0.5, 0.2]);
        assert_eq!(aggregator.counters().intervals, 3);
    }

    #[test]
    fn test_empty_interval_only_counts() {
        let mut aggregator = IntervalAggregator::new(3, RecordingClassifier::new(true));
        aggregator.process_interval(&["t,1,n,0.9"]).unwrap();
        let before = aggregator.features().to_vec();

        let outcome = aggregator.process_interval::<&str>(&[]).unwrap();

        assert_eq!(outcome, IntervalOutcome::NoInput);
        assert_eq!(aggregator.features(), before.as_slice());
        let counters = aggregator.counters();
        assert_eq!(counters.empty_intervals, 1);
        assert_eq!(counters.intervals, 1);
        assert_eq!(counters.messages, 1);
        // No prediction for the empty interval.
        assert_eq!(aggregator.classifier().seen.borrow().len(), 1);
    }

    #[test]
    fn test_malformed_lines_are_ignored() {
        let mut aggregator = IntervalAggregator::new(2, RecordingClassifier::new(false));
        let outcome = aggregator
            .process_interval(&["t,1,n", "t,2,n,0.1,x", "garbage", "t,2,n,0.3"])
            .unwrap();

        assert_eq!(aggregator.features(), &[0.5, 0.3]);
        assert!(matches!(
            outcome,
            IntervalOutcome::Evaluated { messages: 1, .. }
        ));
        assert_eq!(aggregator.counters().messages, 1);
    }

    #[test]
    fn test_interval_of_only_malformed_lines_is_not_empty() {
        let mut aggregator = IntervalAggregator::new(2, RecordingClassifier::new(false));
        let outcome = aggregator.process_interval(&["bad line"]).unwrap();

        assert!(matches!(
            outcome,
            IntervalOutcome::Evaluated {
                interval: 1,
                messages: 0,
                ..
            }
        ));
        assert_eq!(aggregator.counters().empty_intervals, 0);
        assert_eq!(aggregator.features(), &[0.5, 0.5]);
    }

    #[test]
    fn test_sentinel_terminates_without_writing() {
        let mut aggregator = IntervalAggregator::new(3, RecordingClassifier::new(false));
        aggregator
            .process_interval(&["t,1,n,0.9", "t,2,n,0.1"])
            .unwrap();

        let outcome = aggregator.process_interval(&["t,-1,n,0.0"]).unwrap();

        assert!(outcome.is_terminal());
        assert_eq!(aggregator.features(), &[0.9, 0.1, 0.5]);
        let counters = aggregator.counters();
        assert_eq!(counters.messages, 3);
        assert_eq!(counters.sentinels, 1);
        assert_eq!(counters.sensor_events(), 2);
    }

    #[test]
    fn test_sentinel_mixed_with_readings() {
        let mut aggregator = IntervalAggregator::new(3, RecordingClassifier::new(false));
        let outcome = aggregator
            .process_interval(&["t,3,n,0.7", "t,-1,n,0.0", "t,1,n,0.2"])
            .unwrap();

        assert!(outcome.is_terminal());
        assert_eq!(aggregator.features(), &[0.2, 0.5, 0.7]);
    }

    #[test]
    fn test_out_of_range_ids_fail_the_interval() {
        let mut aggregator = IntervalAggregator::new(2, RecordingClassifier::new(false));

        let err = aggregator
            .process_interval(&["t,1,n,0.9", "t,3,n,0.1"])
            .unwrap_err();
        assert_eq!(
            err,
            AggregateError::SensorOutOfRange {
                sensor_id: 3,
                n_sensors: 2
            }
        );

        let err = aggregator.process_interval(&["t,0,n,0.1"]).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::SensorOutOfRange { sensor_id: 0, .. }
        ));

        // Nothing from the failed batches was applied.
        assert_eq!(aggregator.features(), &[0.5, 0.5]);
        assert_eq!(aggregator.counters(), IntervalCounters::default());
    }
}
