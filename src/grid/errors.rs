//! Grid-specific error types

use thiserror::Error;

/// Errors that can occur in grid trading operations
#[derive(Error, Debug, Clone)]
pub enum GridError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient candle history: need {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid candle series: {0}")]
    InvalidCandles(String),

    #[error("Degenerate ladder: tick {tick} collapses levels {index} and {index_next} to {price}")]
    DegenerateLadder {
        tick: f64,
        index: usize,
        index_next: usize,
        price: f64,
    },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Order not found: id {0}")]
    OrderNotFound(u64),

    #[error("State persistence error: {0}")]
    StatePersistence(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl From<std::io::Error> for GridError {
    fn from(err: std::io::Error) -> Self {
        GridError::StatePersistence(err.to_string())
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::JsonParse(err.to_string())
    }
}

impl From<reqwest::Error> for GridError {
    fn from(err: reqwest::Error) -> Self {
        GridError::Gateway(err.to_string())
    }
}

/// Result type for grid operations
pub type GridResult<T> = std::result::Result<T, GridError>;
