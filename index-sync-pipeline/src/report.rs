//! Run report.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use index_sync_shared::BatchResult;

/// Wall-clock time spent in each phase of a run, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseTimings {
    pub ensure_collection_ms: u64,
    pub destination_enumeration_ms: u64,
    pub source_enumeration_ms: u64,
    pub diff_ms: u64,
    pub indexing_ms: u64,
    pub deletion_ms: u64,
    pub total_ms: u64,
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub backend: String,
    pub collection: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    pub source_count: usize,
    pub destination_count: usize,
    pub common_count: usize,
    /// Identifiers in the source but not in the destination.
    pub to_add: usize,
    /// Identifiers in the destination but not in the source.
    pub to_remove: usize,

    pub indexing: BatchResult,
    pub deletion: BatchResult,
    /// Identifiers that vanished from the source between enumeration and fetch.
    pub missing_from_source: usize,
    pub failed_fetch_batches: usize,
    pub fetch_retries: u32,
    pub index_retries: u32,

    pub timings: PhaseTimings,
}

impl SyncReport {
    pub(crate) fn new(run_id: Uuid, backend: &str, collection: &str, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            backend: backend.to_string(),
            collection: collection.to_string(),
            dry_run,
            started_at: now,
            completed_at: now,
            source_count: 0,
            destination_count: 0,
            common_count: 0,
            to_add: 0,
            to_remove: 0,
            indexing: BatchResult::new(),
            deletion: BatchResult::new(),
            missing_from_source: 0,
            failed_fetch_batches: 0,
            fetch_retries: 0,
            index_retries: 0,
            timings: PhaseTimings::default(),
        }
    }

    /// Documents successfully written.
    pub fn added(&self) -> usize {
        self.indexing.succeeded
    }

    /// Documents successfully deleted.
    pub fn removed(&self) -> usize {
        self.deletion.succeeded
    }

    /// Failed additions plus failed deletions.
    pub fn failures(&self) -> usize {
        self.indexing.failed + self.deletion.failed
    }

    /// Emit the final summary line.
    pub fn log(&self) {
        if self.failures() > 0 {
            warn!(
                run_id = %self.run_id,
                added = self.added(),
                removed = self.removed(),
                failures = self.failures(),
                index_failures = ?self.indexing.failure_samples,
                delete_failures = ?self.deletion.failure_samples,
                total_ms = self.timings.total_ms,
                "Sync completed with failures"
            );
        } else {
            info!(
                run_id = %self.run_id,
                added = self.added(),
                removed = self.removed(),
                failures = 0,
                dry_run = self.dry_run,
                total_ms = self.timings.total_ms,
                "Sync completed"
            );
        }
    }
}
