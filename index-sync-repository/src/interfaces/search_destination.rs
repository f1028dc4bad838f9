//! Search destination trait definition.
//!
//! This module defines the abstract interface for a search destination,
//! allowing the reconciliation pipeline to target different backends
//! (OpenSearch, Typesense, ...) selected at configuration time.

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::interfaces::IdentifierCursor;
use crate::types::{BatchOperationSummary, CollectionStatus};
use index_sync_shared::{NormalizedDocument, RecordId};

/// Abstract interface for search destination operations.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, SearchError>`. Callers use
/// [`SearchError::is_retryable`] to decide whether a failed call may be
/// repeated.
#[async_trait]
pub trait SearchDestination: Send + Sync {
    /// Short backend name used in logs and reports.
    fn backend(&self) -> &'static str;

    /// Name of the index or collection this destination writes to.
    fn collection(&self) -> &str;

    /// Check if the search engine is reachable and healthy.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine answered but reports itself unhealthy
    /// * `Err(SearchError)` - If the search engine cannot be reached
    async fn health_check(&self) -> Result<bool, SearchError>;

    /// Create the index or collection with its schema if it does not exist.
    ///
    /// Idempotent: a second call detects the existing collection and returns
    /// [`CollectionStatus::AlreadyExists`] instead of failing.
    async fn ensure_collection(&self) -> Result<CollectionStatus, SearchError>;

    /// Open a cursor over every document identifier in the collection.
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Maximum number of identifiers per batch
    async fn open_id_cursor(
        &self,
        batch_size: usize,
    ) -> Result<Box<dyn IdentifierCursor<SearchError>>, SearchError>;

    /// Create or replace documents in a single bulk request.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - The request went through; per-document
    ///   outcomes are in the summary, and some of them may be failures
    /// * `Err(SearchError)` - The request as a whole failed
    async fn bulk_upsert(
        &self,
        documents: &[NormalizedDocument],
    ) -> Result<BatchOperationSummary, SearchError>;

    /// Delete one document by identifier.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was deleted
    /// * `Err(SearchError::NotFound)` - If the document does not exist
    /// * `Err(SearchError)` - If the deletion fails
    async fn delete_document(&self, id: &RecordId) -> Result<(), SearchError>;
}
