//! OpenSearch implementation of the search destination.
//!
//! Works against OpenSearch and Elasticsearch-compatible clusters: bulk
//! upserts through `_bulk`, identifier listing through the scroll API.

mod client;
mod index_config;
mod scroll;

pub use client::OpenSearchDestination;
pub use index_config::index_settings;
