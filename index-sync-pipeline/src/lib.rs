//! # Index Sync Pipeline
//!
//! This crate provides the pipeline components that reconcile a search
//! destination with the relational source of truth.
//!
//! ## Architecture
//!
//! One run flows through these stages, strictly in sequence:
//!
//! 1. **Enumerator**: reads every identifier from both stores
//! 2. **Differ**: computes the identifiers to add and to remove
//! 3. **Fetcher**: loads full records for the additions, batch by batch
//! 4. **Processor**: normalizes records into search documents
//! 5. **Loader**: indexes the documents and deletes the removals
//! 6. **Orchestrator**: drives the run and produces the report

pub mod differ;
pub mod enumerator;
pub mod errors;
pub mod fetcher;
pub mod loader;
pub mod orchestrator;
pub mod processor;
pub mod report;
pub mod retry;

pub use differ::{diff, SyncPlan};
pub use errors::PipelineError;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use report::{PhaseTimings, SyncReport};
pub use retry::RetryPolicy;
