//! Error types for the runproxy state store.

use thiserror::Error;

/// Result type alias for state backend operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur inside a state backend.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open state backend: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("redis error: {0}")]
    Redis(String),

    #[error("configuration error: {0}")]
    Config(#[from] runproxy_core::ConfigError),
}
