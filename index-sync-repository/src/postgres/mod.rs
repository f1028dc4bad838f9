//! Postgres implementation of the source store.

mod cursor;
mod queries;
mod store;

pub use store::PostgresSource;
