//! # Index Sync Repository
//!
//! This crate provides the interfaces the reconciliation pipeline reads from
//! and writes to, and their concrete implementations: Postgres as the source
//! of truth, OpenSearch and Typesense as search destinations.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod postgres;
pub mod types;
pub mod typesense;

pub use config::{OpenSearchConfig, PostgresConfig, Timeouts, TypesenseConfig};
pub use errors::{SearchError, SourceError};
pub use interfaces::{IdentifierCursor, SearchDestination, SourceStore};
pub use self::opensearch::OpenSearchDestination;
pub use postgres::PostgresSource;
pub use types::{BatchOperationResult, BatchOperationSummary, CollectionStatus};
pub use typesense::TypesenseDestination;
