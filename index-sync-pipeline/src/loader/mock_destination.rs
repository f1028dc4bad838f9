//! In-memory destination shared by the loader tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use index_sync_repository::{
    BatchOperationResult, BatchOperationSummary, CollectionStatus, IdentifierCursor,
    SearchDestination, SearchError,
};
use index_sync_shared::{NormalizedDocument, RecordId};

/// Records upserts and deletes; can be scripted to fail whole requests or
/// reject specific documents.
#[derive(Default)]
pub(crate) struct MockDestination {
    pub documents: Mutex<HashSet<RecordId>>,
    pub request_errors: Mutex<VecDeque<SearchError>>,
    pub rejected: HashSet<RecordId>,
    pub bulk_calls: AtomicUsize,
    pub ensure_calls: AtomicUsize,
}

impl MockDestination {
    pub fn with_documents(ids: impl IntoIterator<Item = RecordId>) -> Self {
        Self {
            documents: Mutex::new(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, error: SearchError) {
        self.request_errors.lock().unwrap().push_back(error);
    }

    pub fn ids(&self) -> HashSet<RecordId> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchDestination for MockDestination {
    fn backend(&self) -> &'static str {
        "mock"
    }

    fn collection(&self) -> &str {
        "listings"
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        Ok(true)
    }

    async fn ensure_collection(&self) -> Result<CollectionStatus, SearchError> {
        if self.ensure_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(CollectionStatus::Created)
        } else {
            Ok(CollectionStatus::AlreadyExists)
        }
    }

    async fn open_id_cursor(
        &self,
        _batch_size: usize,
    ) -> Result<Box<dyn IdentifierCursor<SearchError>>, SearchError> {
        Err(SearchError::query("not supported by the loader mock"))
    }

    async fn bulk_upsert(
        &self,
        documents: &[NormalizedDocument],
    ) -> Result<BatchOperationSummary, SearchError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.request_errors.lock().unwrap().pop_front() {
            return Err(error);
        }

        let mut stored = self.documents.lock().unwrap();
        let results = documents
            .iter()
            .map(|doc| {
                if self.rejected.contains(&doc.id) {
                    BatchOperationResult::failed(doc.id.clone(), "mapper_parsing_exception")
                } else {
                    stored.insert(doc.id.clone());
                    BatchOperationResult::succeeded(doc.id.clone())
                }
            })
            .collect();
        Ok(BatchOperationSummary::from_results(results))
    }

    async fn delete_document(&self, id: &RecordId) -> Result<(), SearchError> {
        if self.documents.lock().unwrap().remove(id) {
            Ok(())
        } else {
            Err(SearchError::NotFound(id.to_string()))
        }
    }
}
