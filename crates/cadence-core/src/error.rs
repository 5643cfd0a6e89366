use thiserror::Error;

use crate::id::{CursorId, RowId};

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The circuit breaker was tripped by the query owner.
    #[error("query was cancelled")]
    Cancelled,

    #[error("query timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// Malformed data met while converting a key or timestamp value.
    /// Non-fatal: the query fails, the engine keeps going.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("row id {row_id} does not belong to {cursor}")]
    InvalidRowId { row_id: RowId, cursor: CursorId },

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// True when the error came from the circuit breaker rather than from data.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
