//! Error types for the decathlon solvers and policy storage.

use thiserror::Error;

/// Errors surfaced by state construction and policy file I/O.
#[derive(Error, Debug)]
pub enum DecathlonError {
    /// A state field lies outside the legal domain of its event.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A policy file failed header or size validation.
    #[error("invalid policy file: {0}")]
    InvalidPolicyFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DecathlonError>;
