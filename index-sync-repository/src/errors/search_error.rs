//! Search destination error types.
//!
//! This module defines the error types that can occur while talking to a
//! search destination, and how they classify for retry.

use thiserror::Error;

/// Errors that can occur during search destination operations.
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    /// Failed to reach the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete within the configured timeout.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// The search engine answered with a non-success status.
    #[error("Request failed with status {status}: {body}")]
    StatusError { status: u16, body: String },

    /// Identifier listing (scroll, export) failed.
    #[error("Query error: {0}")]
    QueryError(String),

    /// A bulk upsert response does not account for every document sent.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create the index or collection.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Document not found.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Client could not be built from its configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Create a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::StatusError {
            status,
            body: body.into(),
        }
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the failure is transient and the request may be retried.
    ///
    /// Network failures, timeouts, throttling (429) and server-side errors
    /// (5xx) are transient. Everything else is a property of the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::ConnectionError(_) | SearchError::TimeoutError(_) => true,
            SearchError::StatusError { status, .. } => *status == 429 || *status >= 500,
            SearchError::QueryError(_)
            | SearchError::BulkIndexError(_)
            | SearchError::DeleteError(_)
            | SearchError::IndexCreationError(_)
            | SearchError::ParseError(_)
            | SearchError::SerializationError(_)
            | SearchError::NotFound(_)
            | SearchError::ConfigError(_) => false,
        }
    }
}

impl From<opensearch::Error> for SearchError {
    fn from(err: opensearch::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if let Some(status) = err.status_code() {
            Self::status(status.as_u16(), err.to_string())
        } else {
            Self::ConnectionError(err.to_string())
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else if let Some(status) = err.status() {
            Self::status(status.as_u16(), err.to_string())
        } else {
            Self::ConnectionError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(SearchError::connection("refused").is_retryable());
        assert!(SearchError::timeout("read timed out").is_retryable());
        assert!(SearchError::status(503, "unavailable").is_retryable());
        assert!(SearchError::status(429, "too many requests").is_retryable());
    }

    #[test]
    fn test_request_errors_are_not_retryable() {
        assert!(!SearchError::status(400, "bad request").is_retryable());
        assert!(!SearchError::status(404, "missing").is_retryable());
        assert!(!SearchError::parse("unexpected token").is_retryable());
        assert!(!SearchError::NotFound("42".to_string()).is_retryable());
    }
}
