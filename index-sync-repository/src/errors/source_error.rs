//! Relational source error types.

use thiserror::Error;

/// Errors that can occur while reading from the source store.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// Failed to establish or keep a connection.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The query was rejected or failed on the server.
    #[error("Query error: {0}")]
    QueryError(String),

    /// A returned row could not be decoded.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The operation did not complete within the configured timeout.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// The store was used after it was closed.
    #[error("Source store is closed")]
    Closed,
}

impl SourceError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Whether the failure is transient and the query may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::ConnectionError(_) | SourceError::TimeoutError(_)
        )
    }
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::TimeoutError(err.to_string()),
            sqlx::Error::PoolClosed => Self::Closed,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
                Self::ConnectionError(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. } => Self::DecodeError(err.to_string()),
            // 57014 is query_canceled, raised when statement_timeout fires.
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("57014") => {
                Self::TimeoutError(err.to_string())
            }
            _ => Self::QueryError(err.to_string()),
        }
    }
}
