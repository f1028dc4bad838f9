//! Typesense implementation of the search destination.
//!
//! Talks to the Typesense HTTP API directly: JSONL import with
//! `action=upsert` for writes, the streamed export endpoint for identifier
//! listing.

mod client;
mod collection_schema;
mod export;

pub use client::TypesenseDestination;
pub use collection_schema::collection_schema;
