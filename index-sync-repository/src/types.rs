//! Response types for destination operations.

use index_sync_shared::RecordId;

/// Outcome of [`ensure_collection`](crate::SearchDestination::ensure_collection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Created,
    AlreadyExists,
}

/// Result of a bulk operation for a single document.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document's identifier.
    pub id: RecordId,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error reported by the destination if the operation failed.
    pub error: Option<String>,
}

impl BatchOperationResult {
    pub fn succeeded(id: RecordId) -> Self {
        Self {
            id,
            success: true,
            error: None,
        }
    }

    pub fn failed(id: RecordId, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Summary of a bulk operation containing aggregate statistics and
/// individual results.
///
/// A bulk request can succeed at the transport level while rejecting some
/// of its documents; this summary carries those per-document outcomes.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of items in the request.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-document results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Results of the documents the destination rejected.
    pub fn failures(&self) -> impl Iterator<Item = &BatchOperationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_results() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult::succeeded(RecordId::from("1")),
            BatchOperationResult::failed(RecordId::from("2"), "mapper_parsing_exception"),
            BatchOperationResult::succeeded(RecordId::from("3")),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        let failures: Vec<_> = summary.failures().collect();
        assert_eq!(failures[0].id, RecordId::from("2"));
    }
}
