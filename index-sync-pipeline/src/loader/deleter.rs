//! Removal of documents that no longer exist in the source.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use index_sync_repository::{SearchDestination, SearchError};
use index_sync_shared::{BatchResult, IdentifierSet, RecordId};

/// Deletes documents one identifier at a time.
pub struct BatchDeleter {
    destination: Arc<dyn SearchDestination>,
}

impl BatchDeleter {
    pub fn new(destination: Arc<dyn SearchDestination>) -> Self {
        Self { destination }
    }

    /// Delete every identifier in `ids`.
    ///
    /// A failed deletion, including a document that is already gone, is
    /// logged and counted; the remaining identifiers are still processed.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_all(&self, ids: &IdentifierSet) -> BatchResult {
        let mut ordered: Vec<&RecordId> = ids.iter().collect();
        ordered.sort();

        let mut result = BatchResult::new();
        for id in ordered {
            match self.destination.delete_document(id).await {
                Ok(()) => result.record_success(),
                Err(SearchError::NotFound(_)) => {
                    warn!(id = %id, "Document to delete was not found");
                    result.record_failure(Some(id.as_str()), "not found");
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "Failed to delete document");
                    result.record_failure(Some(id.as_str()), e.to_string());
                }
            }
        }

        info!(
            deleted = result.succeeded,
            failed = result.failed,
            "Deleted stale documents"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::mock_destination::MockDestination;

    #[tokio::test]
    async fn test_delete_all_counts_successes() {
        let destination = Arc::new(MockDestination::with_documents(
            (1..=3i64).map(RecordId::from),
        ));
        let deleter = BatchDeleter::new(destination.clone());
        let ids: IdentifierSet = [RecordId::from(1), RecordId::from(3)].into_iter().collect();

        let result = deleter.delete_all(&ids).await;

        assert_eq!(result.succeeded, 2);
        assert!(result.is_complete_success());
        assert_eq!(destination.ids(), [RecordId::from(2)].into_iter().collect());
    }

    #[tokio::test]
    async fn test_missing_document_is_a_failure_but_processing_continues() {
        let destination = Arc::new(MockDestination::with_documents([RecordId::from(2)]));
        let deleter = BatchDeleter::new(destination.clone());
        let ids: IdentifierSet = [RecordId::from(1), RecordId::from(2)].into_iter().collect();

        let result = deleter.delete_all(&ids).await;

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.failure_samples[0].reason, "not found");
        assert!(destination.ids().is_empty());
    }
}
