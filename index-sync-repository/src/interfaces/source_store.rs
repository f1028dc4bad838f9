//! Source store trait definition.

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::interfaces::IdentifierCursor;
use index_sync_shared::{RecordId, SourceRecord};

/// The authoritative relational store records are reconciled from.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Verify the store can execute queries.
    async fn health_check(&self) -> Result<(), SourceError>;

    /// Count every record in the primary table.
    async fn count_records(&self) -> Result<u64, SourceError>;

    /// Open a server-side cursor over every record identifier.
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Maximum number of identifiers per batch
    async fn open_id_cursor(
        &self,
        batch_size: usize,
    ) -> Result<Box<dyn IdentifierCursor<SourceError>>, SourceError>;

    /// Fetch full records, with their auxiliary embedding data, for a batch of
    /// identifiers.
    ///
    /// Records without auxiliary data are returned with those fields null.
    /// Identifiers with no row in the primary table are absent from the result.
    /// A failed query is an error; partial results are never returned.
    async fn fetch_records(&self, ids: &[RecordId]) -> Result<Vec<SourceRecord>, SourceError>;

    /// Release the connection. Further calls fail with [`SourceError::Closed`].
    async fn close(&self);
}
