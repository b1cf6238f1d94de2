//! Binary classifiers evaluated once per interval.
//!
//! Models are trained elsewhere and shipped as JSON documents:
//!
//! ```json
//! { "weights": [0.8, -1.2, 0.3], "intercept": -0.1, "threshold": 0.5 }
//! ```

use serde::{Deserialize, Serialize};
use statrs::function::logistic::logistic;

/// Default decision threshold on the predicted probability.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// A pre-trained binary classifier over a fixed-size feature vector.
pub trait Classifier {
    /// Returns `true` when the feature vector needs attention.
    fn predict(&self, features: &[f64]) -> bool;
}

/// Binary logistic-regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionModel {
    /// One weight per sensor
    pub weights: Vec<f64>,
    /// Bias term
    #[serde(default)]
    pub intercept: f64,
    /// Probability above which the prediction is positive
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl LogisticRegressionModel {
    /// Create a model with the default threshold.
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self {
            weights,
            intercept,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Deserialize a model from its JSON representation.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelError> {
        serde_json::from_slice(bytes).map_err(|e| ModelError::Parse(e.to_string()))
    }

    /// Number of features the model expects.
    pub fn num_features(&self) -> usize {
        self.weights.len()
    }

    /// Check that the model fits a feature vector of `n_sensors` values.
    pub fn validate(&self, n_sensors: usize) -> Result<(), ModelError> {
        if self.weights.len() != n_sensors {
            return Err(ModelError::DimensionMismatch {
                expected: n_sensors,
                actual: self.weights.len(),
            });
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ModelError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }

    /// Probability of the positive class.
    pub fn probability(&self, features: &[f64]) -> f64 {
        let margin: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        logistic(margin)
    }
}

impl Classifier for LogisticRegressionModel {
    fn predict(&self, features: &[f64]) -> bool {
        self.probability(features) > self.threshold
    }
}

/// Model errors.
#[derive(Debug)]
pub enum ModelError {
    /// The model document could not be parsed
    Parse(String),
    /// The model was trained for a different number of sensors
    DimensionMismatch { expected: usize, actual: usize },
    /// The threshold is not a probability
    InvalidThreshold(f64),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Parse(e) => write!(f, "Model parse error: {e}"),
            ModelError::DimensionMismatch { expected, actual } => write!(
                f,
                "Model has {actual} weights but {expected} sensors are configured"
            ),
            ModelError::InvalidThreshold(t) => {
                write!(f, "Model threshold {t} is outside [0, 1]")
            }
        }
    }
}

impl std::error::Error for ModelError {}
