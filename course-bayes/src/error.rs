//! Error types for Bayesian table operations

use thiserror::Error;

/// Error type for Bayes-rule computations
#[derive(Error, Debug)]
pub enum BayesError {
    /// Hypothesis label not present in the table
    #[error("unknown hypothesis: {0}")]
    UnknownHypothesis(String),

    /// Observation label not present in the table
    #[error("unknown observation: {0}")]
    UnknownObservation(String),

    /// The observation has probability zero under every hypothesis, so the
    /// posterior is undefined
    #[error("observation {0:?} is impossible under the current priors")]
    ImpossibleObservation(String),

    /// Table dimensions do not line up
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// A probability vector is not a valid distribution
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),
}

/// Result type alias for Bayes operations
pub type Result<T> = std::result::Result<T, BayesError>;
