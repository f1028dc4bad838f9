//! Orchestrator module for the reconciliation pipeline.
//!
//! Coordinates enumeration, diffing, fetching, normalization, indexing and
//! deletion for one run.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::differ::{diff, SyncPlan, DIFF_SAMPLE_SIZE};
use crate::enumerator::{enumerate_destination, enumerate_source};
use crate::errors::PipelineError;
use crate::fetcher::BulkFetcher;
use crate::loader::{BatchDeleter, BatchIndexer, IndexerConfig};
use crate::processor::RecordNormalizer;
use crate::report::{millis, SyncReport};
use crate::retry::RetryPolicy;
use index_sync_repository::{SearchDestination, SourceStore};
use index_sync_shared::{BatchResult, DocumentSchema, RecordId};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Identifiers per batch when enumerating the source.
    pub source_batch_size: usize,
    /// Identifiers per batch when enumerating the destination.
    pub destination_batch_size: usize,
    /// Records per fetch batch.
    pub fetch_batch_size: usize,
    /// Retry policy for fetch batches.
    pub fetch_retry: RetryPolicy,
    pub indexer: IndexerConfig,
    /// Enumerate and diff only; write nothing.
    pub dry_run: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            source_batch_size: 100_000,
            destination_batch_size: 1_000,
            fetch_batch_size: 500,
            fetch_retry: RetryPolicy::default(),
            indexer: IndexerConfig::default(),
            dry_run: false,
        }
    }
}

/// Orchestrator that drives one reconciliation run.
///
/// Batches are processed strictly in sequence. The source connection is
/// closed when the run ends, whether it succeeds or fails.
pub struct Orchestrator {
    source: Arc<dyn SourceStore>,
    destination: Arc<dyn SearchDestination>,
    fetcher: BulkFetcher,
    normalizer: RecordNormalizer,
    indexer: BatchIndexer,
    deleter: BatchDeleter,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create a new orchestrator with default configuration.
    pub fn new(
        source: Arc<dyn SourceStore>,
        destination: Arc<dyn SearchDestination>,
        schema: DocumentSchema,
    ) -> Self {
        Self::with_config(source, destination, schema, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        source: Arc<dyn SourceStore>,
        destination: Arc<dyn SearchDestination>,
        schema: DocumentSchema,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            fetcher: BulkFetcher::new(
                source.clone(),
                config.fetch_batch_size,
                config.fetch_retry.clone(),
            ),
            normalizer: RecordNormalizer::new(schema),
            indexer: BatchIndexer::with_config(destination.clone(), config.indexer.clone()),
            deleter: BatchDeleter::new(destination.clone()),
            source,
            destination,
            config,
        }
    }

    /// Run one reconciliation and return its report.
    ///
    /// Per-batch and per-record failures are counted in the report; an
    /// error is returned only when the run cannot continue: collection
    /// setup or enumeration failed, or the source closed mid-run.
    #[instrument(skip(self), fields(backend = self.destination.backend(), collection = self.destination.collection()))]
    pub async fn run(&self) -> Result<SyncReport, PipelineError> {
        let result = self.reconcile().await;
        self.source.close().await;

        match &result {
            Ok(report) => report.log(),
            Err(e) => error!(error = %e, "Sync aborted"),
        }
        result
    }

    async fn reconcile(&self) -> Result<SyncReport, PipelineError> {
        let started = Instant::now();
        let mut report = SyncReport::new(
            Uuid::new_v4(),
            self.destination.backend(),
            self.destination.collection(),
            self.config.dry_run,
        );
        info!(run_id = %report.run_id, dry_run = self.config.dry_run, "Starting sync");

        if self.config.dry_run {
            info!("Dry run, skipping collection setup");
        } else {
            let phase = Instant::now();
            let status = self.indexer.ensure_collection().await?;
            report.timings.ensure_collection_ms = millis(phase.elapsed());
            info!(status = ?status, "Destination collection ready");
        }

        let destination = enumerate_destination(
            self.destination.as_ref(),
            self.config.destination_batch_size,
        )
        .await?;
        report.destination_count = destination.len();
        report.timings.destination_enumeration_ms = millis(destination.elapsed);

        let source =
            enumerate_source(self.source.as_ref(), self.config.source_batch_size).await?;
        report.source_count = source.len();
        report.timings.source_enumeration_ms = millis(source.elapsed);
        self.verify_source_count(source.len()).await;

        let phase = Instant::now();
        let plan = diff(&destination.ids, &source.ids);
        drop(destination);
        drop(source);
        report.timings.diff_ms = millis(phase.elapsed());
        report.common_count = plan.common;
        report.to_add = plan.additions.len();
        report.to_remove = plan.removals.len();
        log_plan(&plan);

        if self.config.dry_run {
            report.timings.total_ms = millis(started.elapsed());
            report.completed_at = Utc::now();
            return Ok(report);
        }

        let phase = Instant::now();
        self.add_records(&plan, &mut report).await?;
        report.timings.indexing_ms = millis(phase.elapsed());

        let phase = Instant::now();
        if !plan.removals.is_empty() {
            report.deletion = self.deleter.delete_all(&plan.removals).await;
        }
        report.timings.deletion_ms = millis(phase.elapsed());

        report.timings.total_ms = millis(started.elapsed());
        report.completed_at = Utc::now();
        Ok(report)
    }

    /// Fetch, normalize and index every addition, one fetch batch at a time.
    async fn add_records(
        &self,
        plan: &SyncPlan,
        report: &mut SyncReport,
    ) -> Result<(), PipelineError> {
        if plan.additions.is_empty() {
            info!("No records to add");
            return Ok(());
        }

        let batches = self.fetcher.batches(&plan.additions);
        let total_batches = batches.len();
        let total_ids = plan.additions.len();
        let mut processed = 0;

        for (i, ids) in batches.iter().enumerate() {
            let result = self.add_batch(ids, report).await?;
            processed += ids.len();

            info!(
                batch = i + 1,
                batches = total_batches,
                processed,
                total = total_ids,
                succeeded = result.succeeded,
                failed = result.failed,
                added_so_far = report.indexing.succeeded + result.succeeded,
                "Processed fetch batch"
            );
            report.indexing.merge(result);
        }
        Ok(())
    }

    async fn add_batch(
        &self,
        ids: &[RecordId],
        report: &mut SyncReport,
    ) -> Result<BatchResult, PipelineError> {
        let mut result = BatchResult::new();

        let fetched = match self.fetcher.fetch(ids).await {
            Ok(fetched) => fetched,
            Err(failure) => {
                report.fetch_retries += failure.retries;
                if failure.error.is_fatal() {
                    return Err(failure.error);
                }
                report.failed_fetch_batches += 1;
                result.record_failures(ids.len(), failure.error.to_string());
                return Ok(result);
            }
        };
        report.fetch_retries += fetched.retries;
        report.missing_from_source += fetched.missing;

        let normalized = self.normalizer.normalize_batch(&fetched.records);
        for (id, reason) in &normalized.rejected {
            result.record_failure(Some(id.as_str()), reason.clone());
        }

        let indexed = self.indexer.index(&normalized.documents).await;
        report.index_retries += indexed.retries;
        result.merge(indexed.result);
        Ok(result)
    }

    /// Compare the enumerated size with an independent count. A mismatch is
    /// logged, not fatal: the table can change between the two queries.
    async fn verify_source_count(&self, enumerated: usize) {
        match self.source.count_records().await {
            Ok(count) if count == enumerated as u64 => {}
            Ok(count) => warn!(
                enumerated,
                counted = count,
                "Source enumeration does not match row count"
            ),
            Err(e) => warn!(error = %e, "Failed to count source records"),
        }
    }
}

fn log_plan(plan: &SyncPlan) {
    info!(
        to_add = plan.additions.len(),
        to_remove = plan.removals.len(),
        common = plan.common,
        "Computed sync plan"
    );
    if !plan.additions.is_empty() {
        info!(sample = ?plan.sample_additions(DIFF_SAMPLE_SIZE), "Sample of records to add");
    }
    if !plan.removals.is_empty() {
        info!(sample = ?plan.sample_removals(DIFF_SAMPLE_SIZE), "Sample of records to remove");
    }
}
