//! Batch indexing into the search destination.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::errors::PipelineError;
use crate::retry::RetryPolicy;
use index_sync_repository::{CollectionStatus, SearchDestination, SearchError};
use index_sync_shared::{BatchResult, NormalizedDocument, MAX_FAILURE_SAMPLES};

/// Configuration for the batch indexer.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Documents per bulk request.
    pub sub_batch_size: usize,
    /// Pause between consecutive bulk requests.
    pub batch_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            sub_batch_size: 100,
            batch_delay: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of indexing one batch of documents.
#[derive(Debug, Default)]
pub struct IndexOutcome {
    pub result: BatchResult,
    /// Retries spent across all sub-batches.
    pub retries: u32,
}

/// Indexer that writes documents to the destination in bulk.
///
/// A failed sub-batch never stops the run: its documents are counted as
/// failed and indexing moves on to the next sub-batch.
pub struct BatchIndexer {
    destination: Arc<dyn SearchDestination>,
    config: IndexerConfig,
}

impl BatchIndexer {
    pub fn new(destination: Arc<dyn SearchDestination>) -> Self {
        Self::with_config(destination, IndexerConfig::default())
    }

    pub fn with_config(destination: Arc<dyn SearchDestination>, config: IndexerConfig) -> Self {
        Self {
            destination,
            config: IndexerConfig {
                sub_batch_size: config.sub_batch_size.max(1),
                ..config
            },
        }
    }

    /// Create the collection with its schema if it does not exist.
    pub async fn ensure_collection(&self) -> Result<CollectionStatus, PipelineError> {
        self.destination
            .ensure_collection()
            .await
            .map_err(|e| PipelineError::loader(e.to_string()))
    }

    /// Index documents in sub-batches, retrying transient request failures.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn index(&self, documents: &[NormalizedDocument]) -> IndexOutcome {
        let mut outcome = IndexOutcome::default();
        let sub_batches = documents.len().div_ceil(self.config.sub_batch_size);

        for (i, chunk) in documents.chunks(self.config.sub_batch_size).enumerate() {
            let attempt = self
                .config
                .retry
                .run(
                    "bulk_upsert",
                    || self.destination.bulk_upsert(chunk),
                    SearchError::is_retryable,
                )
                .await;
            outcome.retries += attempt.retries();

            let mut result = BatchResult::new();
            match attempt.result {
                Ok(summary) => {
                    for item in &summary.results {
                        if item.success {
                            result.record_success();
                        } else {
                            result.record_failure(
                                Some(item.id.as_str()),
                                item.error.as_deref().unwrap_or("rejected"),
                            );
                        }
                    }
                    if summary.failed > 0 {
                        warn!(
                            sub_batch = i + 1,
                            failed = summary.failed,
                            samples = ?summary
                                .failures()
                                .take(MAX_FAILURE_SAMPLES)
                                .map(|f| (f.id.as_str(), f.error.as_deref().unwrap_or("")))
                                .collect::<Vec<_>>(),
                            "Destination rejected documents"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        sub_batch = i + 1,
                        count = chunk.len(),
                        error = %e,
                        "Bulk request failed, skipping sub-batch"
                    );
                    result.record_failures(chunk.len(), e.to_string());
                }
            }

            debug!(
                sub_batch = i + 1,
                sub_batches,
                succeeded = result.succeeded,
                failed = result.failed,
                "Indexed sub-batch"
            );
            outcome.result.merge(result);

            if i + 1 < sub_batches && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        info!(
            succeeded = outcome.result.succeeded,
            failed = outcome.result.failed,
            retries = outcome.retries,
            "Indexed batch"
        );
        outcome
    }
}
