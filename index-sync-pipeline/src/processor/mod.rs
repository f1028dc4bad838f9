//! Processor module for the reconciliation pipeline.
//!
//! Transforms fetched source records into search documents.

mod record_normalizer;

pub use record_normalizer::{NormalizedBatch, RecordNormalizer};
