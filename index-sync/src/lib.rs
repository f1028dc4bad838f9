//! # Index Sync
//!
//! Entry point and configuration for reconciling a search destination with
//! its Postgres source of truth.

pub mod config;

pub use config::{Dependencies, DestinationKind, SyncConfig};

use thiserror::Error;

/// Errors that stop a sync before or during its run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A store could not be reached at startup.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] index_sync_pipeline::PipelineError),
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }
}
