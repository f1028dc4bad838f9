//! Loader module for the reconciliation pipeline.
//!
//! Writes normalized documents into the search destination and removes
//! documents that no longer exist in the source.

mod deleter;
mod indexer;

#[cfg(test)]
mod mock_destination;

pub use deleter::BatchDeleter;
pub use indexer::{BatchIndexer, IndexOutcome, IndexerConfig};
