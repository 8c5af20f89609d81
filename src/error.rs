//! Error types for the retraining orchestrator

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, RetrainerError>;

/// Errors surfaced by the orchestrator and its stages
#[derive(Debug, Error)]
pub enum RetrainerError {
    /// Orchestrator is globally disabled; no job was created
    #[error("retraining is disabled")]
    Disabled,

    /// Concurrency ceiling reached; no job was created
    #[error("max concurrent retraining jobs reached ({0})")]
    ConcurrencyLimit(usize),

    /// Data collection returned fewer samples than the policy minimum
    #[error("insufficient training samples: got {got}, need at least {min}")]
    InsufficientSamples { got: usize, min: usize },

    /// Pluggable trainer failed
    #[error("training failed: {0}")]
    Training(String),

    /// Data collector failed
    #[error("data collection failed: {0}")]
    Collection(String),

    /// Deployment stage failed
    #[error("deployment failed: {0}")]
    Deployment(String),

    /// Config file could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}
