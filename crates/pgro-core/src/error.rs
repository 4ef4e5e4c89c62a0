//! Error type shared by the planning crates.
//!
//! Algorithm crates define narrower error enums at their seams (oracle, cascade, cuts)
//! and convert into [`PgroError`] at API boundaries.

use thiserror::Error;

/// Unified error type for grid modeling, simulation and cut generation.
#[derive(Error, Debug)]
pub enum PgroError {
    /// I/O errors (instance files, trace exports, snapshot dumps)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Instance validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Structural grid errors (duplicate ids, unknown endpoints, self loops)
    #[error("Grid error: {0}")]
    Grid(String),

    /// DC-flow oracle failures. Infeasibility lands here and is fatal for the run.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// External solver errors (incumbent repair sub-solve)
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type PgroResult<T> = Result<T, PgroError>;

impl From<anyhow::Error> for PgroError {
    fn from(err: anyhow::Error) -> Self {
        PgroError::Other(err.to_string())
    }
}

impl From<String> for PgroError {
    fn from(s: String) -> Self {
        PgroError::Other(s)
    }
}

impl From<&str> for PgroError {
    fn from(s: &str) -> Self {
        PgroError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for PgroError {
    fn from(err: serde_json::Error) -> Self {
        PgroError::Parse(err.to_string())
    }
}
