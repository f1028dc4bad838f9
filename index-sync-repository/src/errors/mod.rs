//! Error types for the store and destination backends.

mod search_error;
mod source_error;

pub use search_error::SearchError;
pub use source_error::SourceError;
