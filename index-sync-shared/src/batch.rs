//! Per-batch outcome accounting.

use serde::Serialize;

/// Maximum number of failure details retained per batch.
pub const MAX_FAILURE_SAMPLES: usize = 5;

/// One sampled failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSample {
    /// Record the failure belongs to, if it is attributable to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reason: String,
}

/// Outcome of one batch or sub-batch.
///
/// Only the first [`MAX_FAILURE_SAMPLES`] failures keep their details; the
/// counts always cover every item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failure_samples: Vec<FailureSample>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, id: Option<&str>, reason: impl Into<String>) {
        self.attempted += 1;
        self.failed += 1;
        self.push_sample(id, reason);
    }

    /// Count `count` items as failed with one shared reason.
    pub fn record_failures(&mut self, count: usize, reason: impl Into<String>) {
        if count == 0 {
            return;
        }
        self.attempted += count;
        self.failed += count;
        self.push_sample(None, reason);
    }

    /// Fold another result into this one, keeping the sample bound.
    pub fn merge(&mut self, other: BatchResult) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        let room = MAX_FAILURE_SAMPLES.saturating_sub(self.failure_samples.len());
        self.failure_samples
            .extend(other.failure_samples.into_iter().take(room));
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }

    fn push_sample(&mut self, id: Option<&str>, reason: impl Into<String>) {
        if self.failure_samples.len() < MAX_FAILURE_SAMPLES {
            self.failure_samples.push(FailureSample {
                id: id.map(str::to_string),
                reason: reason.into(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_cover_all_failures_but_samples_are_bounded() {
        let mut result = BatchResult::new();
        for i in 0..20 {
            result.record_failure(Some(&i.to_string()), "rejected");
        }
        result.record_success();

        assert_eq!(result.attempted, 21);
        assert_eq!(result.failed, 20);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failure_samples.len(), MAX_FAILURE_SAMPLES);
    }

    #[test]
    fn test_merge() {
        let mut total = BatchResult::new();
        let mut a = BatchResult::new();
        a.record_success();
        a.record_failure(Some("1"), "bad vector");
        let mut b = BatchResult::new();
        b.record_failures(100, "transport failure");

        total.merge(a);
        total.merge(b);

        assert_eq!(total.attempted, 102);
        assert_eq!(total.succeeded, 1);
        assert_eq!(total.failed, 101);
        assert_eq!(total.failure_samples.len(), 2);
        assert!(!total.is_complete_success());
    }

    #[test]
    fn test_record_zero_failures_is_noop() {
        let mut result = BatchResult::new();
        result.record_failures(0, "nothing");
        assert_eq!(result, BatchResult::default());
    }
}
