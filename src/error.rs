//! Error types for cram.

use thiserror::Error;

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// User-actionable configuration problem (missing API key, bad config file).
    #[error("configuration error: {0}")]
    Config(String),

    /// Completion provider returned an error; the message is surfaced verbatim.
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// True when the underlying SQLite error is a missing backing table.
/// Cache reads treat this as a miss, cache writes as a no-op.
pub fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("no such table"))
}

/// True when the underlying SQLite error is a transient lock conflict.
pub fn is_locked(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}
