/// Rowgate Error Module
///
/// This module defines the error taxonomy of the data-access layer. Every
/// failure is surfaced synchronously to the immediate caller; nothing is
/// retried or swallowed internally.
use thiserror::Error;

/// Error type for every gateway operation.
///
/// The variants map onto the layers of the crate:
/// - Connection construction (malformed DSN, driver refused to open)
/// - Query compilation (bad identifiers, operators or condition shapes)
/// - Persistence preconditions (writes that need an id)
/// - Statement bookkeeping (affected rows with nothing executed)
/// - Driver failures, configuration and seed loading
#[derive(Error, Debug)]
pub enum RowgateError {
    /// The connection could not be established or the DSN is misconfigured
    #[error("Connection error for DSN '{dsn}': {reason}")]
    Connection { dsn: String, reason: String },

    /// Invalid identifier, disallowed operator or malformed condition
    #[error("Query error: {0}")]
    Query(String),

    /// Update or delete attempted on a record without an id
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Affected rows requested before any statement ran
    #[error("No statement has been executed on this connection")]
    NoStatement,

    /// Driver-level failures (constraint violations, I/O inside SQLite, ...)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Seed data that does not match the registered tables
    #[error("Seed error: {0}")]
    Seed(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RowgateError {
    pub(crate) fn connection(dsn: &str, reason: impl Into<String>) -> Self {
        RowgateError::Connection {
            dsn: dsn.to_string(),
            reason: reason.into(),
        }
    }
}

/// Type alias for Result to use RowgateError as the error type.
pub type Result<T> = std::result::Result<T, RowgateError>;
