//! Bulk record fetching.
//!
//! Turns a set of identifiers into fetch batches and loads each batch's
//! full records from the source, retrying transient failures.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::differ::natural_cmp;
use crate::errors::PipelineError;
use crate::retry::RetryPolicy;
use index_sync_repository::{SourceError, SourceStore};
use index_sync_shared::{IdentifierSet, RecordId, SourceRecord};

/// Records loaded for one fetch batch.
#[derive(Debug, Default)]
pub struct FetchedBatch {
    pub records: Vec<SourceRecord>,
    /// Requested identifiers with no row in the source, e.g. deleted after
    /// enumeration.
    pub missing: usize,
    /// Retries spent on this batch.
    pub retries: u32,
}

/// A fetch batch that could not be loaded even after retrying.
#[derive(Debug)]
pub struct FetchFailure {
    pub error: PipelineError,
    pub retries: u32,
}

/// Loads full records for batches of identifiers.
pub struct BulkFetcher {
    source: Arc<dyn SourceStore>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl BulkFetcher {
    pub fn new(source: Arc<dyn SourceStore>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Split identifiers into fetch batches.
    ///
    /// Batches are disjoint, each at most `batch_size` long, and together
    /// cover every identifier exactly once. Identifiers are ordered first so
    /// a run's batches are reproducible.
    pub fn batches(&self, ids: &IdentifierSet) -> Vec<Vec<RecordId>> {
        let mut ordered: Vec<RecordId> = ids.iter().cloned().collect();
        ordered.sort_by(|a, b| natural_cmp(a.as_str(), b.as_str()));

        ordered
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Fetch one batch of records, retrying transient source errors.
    ///
    /// A closed source fails with the fatal `SourceError`; any other failure
    /// becomes a `FetchError` for this batch alone.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn fetch(&self, ids: &[RecordId]) -> Result<FetchedBatch, FetchFailure> {
        let outcome = self
            .retry
            .run(
                "fetch_records",
                || self.source.fetch_records(ids),
                SourceError::is_retryable,
            )
            .await;
        let retries = outcome.retries();

        match outcome.result {
            Ok(records) => {
                let missing = ids.len().saturating_sub(records.len());
                if missing > 0 {
                    debug!(missing, "Identifiers no longer present in source");
                }
                Ok(FetchedBatch {
                    records,
                    missing,
                    retries,
                })
            }
            Err(e) => {
                warn!(error = %e, attempts = retries + 1, "Fetch batch failed");
                let error = match e {
                    SourceError::Closed => PipelineError::from(SourceError::Closed),
                    other => PipelineError::fetch(other.to_string()),
                };
                Err(FetchFailure { error, retries })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use index_sync_repository::IdentifierCursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` fetches with a timeout, then returns every
    /// requested id except "gone". A closed source fails every fetch.
    struct FlakySource {
        failures: usize,
        closed: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceStore for FlakySource {
        async fn health_check(&self) -> Result<(), SourceError> {
            Ok(())
        }

        async fn count_records(&self) -> Result<u64, SourceError> {
            Ok(0)
        }

        async fn open_id_cursor(
            &self,
            _batch_size: usize,
        ) -> Result<Box<dyn IdentifierCursor<SourceError>>, SourceError> {
            Err(SourceError::Closed)
        }

        async fn fetch_records(&self, ids: &[RecordId]) -> Result<Vec<SourceRecord>, SourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.closed {
                return Err(SourceError::Closed);
            }
            if n < self.failures {
                return Err(SourceError::timeout("statement timeout"));
            }
            Ok(ids
                .iter()
                .filter(|id| id.as_str() != "gone")
                .map(|id| SourceRecord::new(id.clone()))
                .collect())
        }

        async fn close(&self) {}
    }

    fn fetcher(failures: usize, batch_size: usize) -> BulkFetcher {
        let source = FlakySource {
            failures,
            closed: false,
            calls: AtomicUsize::new(0),
        };
        fetcher_for(source, batch_size)
    }

    fn fetcher_for(source: FlakySource, batch_size: usize) -> BulkFetcher {
        let policy = RetryPolicy {
            max_attempts: 3,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            jitter: false,
        };
        BulkFetcher::new(Arc::new(source), batch_size, policy)
    }

    #[test]
    fn test_batches_partition_ids() {
        let ids: IdentifierSet = (1..=1234i64).map(RecordId::from).collect();

        let batches = fetcher(0, 500).batches(&ids);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 500);
        assert_eq!(batches[2].len(), 234);
        assert_eq!(batches[0][0], RecordId::from(1));

        let rejoined: IdentifierSet = batches.into_iter().flatten().collect();
        assert_eq!(rejoined, ids);
    }

    #[test]
    fn test_batches_with_mixed_ids() {
        let ids: IdentifierSet = (1..=3000i64)
            .map(|n| {
                if n % 3 == 0 {
                    RecordId::from(format!("{}a", n))
                } else {
                    RecordId::from(n)
                }
            })
            .collect();

        let batches = fetcher(0, 500).batches(&ids);

        assert_eq!(batches.len(), 6);
        assert!(batches.iter().all(|b| b.len() == 500));

        let ordered: Vec<RecordId> = batches.into_iter().flatten().collect();
        assert_eq!(ordered[0], RecordId::from(1));
        assert_eq!(ordered[1999], RecordId::from(2999));
        assert_eq!(ordered[2000], RecordId::from("1002a"));
        assert_eq!(ordered[2999], RecordId::from("9a"));

        let rejoined: IdentifierSet = ordered.into_iter().collect();
        assert_eq!(rejoined, ids);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_retries_transient_errors() {
        let fetcher = fetcher(2, 500);
        let ids = vec![RecordId::from(1), RecordId::from(2)];

        let batch = fetcher.fetch(&ids).await.unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.retries, 2);
        assert_eq!(batch.missing, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_gives_up_after_retries() {
        let fetcher = fetcher(10, 500);

        let failure = fetcher.fetch(&[RecordId::from(1)]).await.unwrap_err();

        assert_eq!(failure.retries, 2);
        assert!(matches!(failure.error, PipelineError::FetchError(_)));
    }

    #[tokio::test]
    async fn test_fetch_from_closed_source_is_fatal() {
        let fetcher = fetcher_for(
            FlakySource {
                failures: 0,
                closed: true,
                calls: AtomicUsize::new(0),
            },
            500,
        );

        let failure = fetcher.fetch(&[RecordId::from(1)]).await.unwrap_err();

        assert_eq!(failure.retries, 0);
        assert!(matches!(failure.error, PipelineError::SourceError(SourceError::Closed)));
        assert!(failure.error.is_fatal());
    }

    #[tokio::test]
    async fn test_fetch_counts_missing_rows() {
        let fetcher = fetcher(0, 500);
        let ids = vec![RecordId::from(1), RecordId::from("gone")];

        let batch = fetcher.fetch(&ids).await.unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.missing, 1);
    }
}
