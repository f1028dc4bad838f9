//! # Index Sync Shared
//!
//! Plain data types shared by the source store, the search destinations
//! and the reconciliation pipeline.

mod batch;
mod record;
mod schema;

pub use batch::{BatchResult, FailureSample, MAX_FAILURE_SAMPLES};
pub use record::{
    DocumentValue, FieldValue, IdentifierSet, NormalizedDocument, RecordId, SourceRecord,
};
pub use schema::{DocumentSchema, FieldKind, FieldSpec, DEFAULT_EMBEDDING_DIMS};
