//! Error kinds shared by every component in the engine.

use thiserror::Error;

/// Result alias used throughout `memento-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// The error kinds named by the tool surface and the persistence layer.
///
/// Variants map onto the error kinds in the external interface: `InvalidArgument`
/// and `NotFound` are user-visible, `Contention` is only surfaced after the
/// Persistence Gateway's retry budget is exhausted, `ProviderUnavailable` never
/// fails a store or search (search is marked degraded instead), and `Internal`
/// carries a generic message plus a correlation id for logs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store busy, retries exhausted")]
    Contention,

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("operation timed out")]
    Timeout,

    #[error("scheduler job already running")]
    AlreadyRunning,

    #[error("internal error ({correlation_id}): {message}")]
    Internal {
        correlation_id: String,
        message: String,
    },

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Build an `Internal` error, stamping a correlation id so the detail can
    /// be correlated with a log line without leaking it to the caller.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
        }
    }

    /// Whether a persistence call observing this error should be retried by
    /// the Gateway's backoff loop (`SQLITE_BUSY` / `SQLITE_LOCKED`).
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            Error::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}
