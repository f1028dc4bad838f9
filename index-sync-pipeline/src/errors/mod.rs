//! Error types for the reconciliation pipeline.

use index_sync_repository::{SearchError, SourceError};
use thiserror::Error;

/// Errors that can occur in the reconciliation pipeline.
///
/// Only errors that abort a run surface as `PipelineError` from the
/// orchestrator; per-batch and per-record failures are counted in the report.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error from the source store.
    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),

    /// Error from the search destination.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),

    /// Identifier enumeration did not complete.
    #[error("Enumeration of {side} failed: {message}")]
    EnumerationError { side: &'static str, message: String },

    /// A fetch batch could not be read from the source.
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// The destination collection could not be prepared.
    #[error("Loader error: {0}")]
    LoaderError(String),
}

impl PipelineError {
    /// Create an enumeration error.
    pub fn enumeration(side: &'static str, msg: impl Into<String>) -> Self {
        Self::EnumerationError {
            side,
            message: msg.into(),
        }
    }

    /// Create a fetch error.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::FetchError(msg.into())
    }

    /// Create a loader error.
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::LoaderError(msg.into())
    }

    /// Whether the error aborts the run. A `FetchError` only costs its batch,
    /// which is skipped and counted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FetchError(_))
    }
}
