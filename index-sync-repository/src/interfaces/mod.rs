//! Interface definitions for the source store and the search destinations.
//!
//! The traits here let the pipeline work against any backend pair and be
//! tested against in-memory implementations.

mod identifier_cursor;
mod search_destination;
mod source_store;

pub use identifier_cursor::IdentifierCursor;
pub use search_destination::SearchDestination;
pub use source_store::SourceStore;
