//! Error types for Terrastat

use thiserror::Error;

/// Main error type for Terrastat operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Insufficient data: {needed} valid points required, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Numerical failure: {0}")]
    NumericalFailure(String),

    #[error("No valid neighbors within search radius")]
    NoValidNeighbors,

    #[error("Invalid surface dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in surface of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Terrastat operations
pub type Result<T> = std::result::Result<T, Error>;
