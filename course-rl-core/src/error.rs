//! Error types for the RL core library

use thiserror::Error;

/// Core error type for RL operations
#[derive(Error, Debug)]
pub enum RlError {
    /// Environment-related errors
    #[error("environment error: {0}")]
    Environment(String),

    /// Agent-related errors
    #[error("agent error: {0}")]
    Agent(String),

    /// Policy-related errors
    #[error("policy error: {0}")]
    Policy(String),

    /// Invalid action
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Dimension mismatch between an observation and what a component expects
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Replay memory holds fewer transitions than a sample requires
    #[error("replay memory underfilled: requested {requested}, only {available} stored")]
    ReplayUnderfilled {
        /// Requested batch size
        requested: usize,
        /// Transitions currently stored
        available: usize,
    },

    /// Computation error
    #[error("computation error: {0}")]
    Computation(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RlError>;
