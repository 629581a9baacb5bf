//! Error types for the portfolio engine.

use thiserror::Error;

/// Main error type for risk, optimization, and backtest operations.
#[derive(Error, Debug)]
pub enum BallastError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid confidence level: {0} (must be in (0, 1))")]
    InvalidConfidenceLevel(f64),

    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid volume: {0} (average daily volume must be positive)")]
    InvalidVolume(f64),

    #[error("Degenerate correlation matrix: {0}")]
    DegenerateCorrelationMatrix(String),

    #[error("Optimization infeasible: {0}")]
    Infeasible(String),

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for portfolio engine operations.
pub type Result<T> = std::result::Result<T, BallastError>;
