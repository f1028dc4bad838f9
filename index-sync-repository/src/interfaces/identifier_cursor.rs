//! Server-side identifier cursor.

use async_trait::async_trait;

use index_sync_shared::IdentifierSet;

/// Lazily pages through every identifier of a store.
///
/// A cursor owns a server-side resource (a declared SQL cursor, a scroll
/// context, an open export stream). Callers must call [`close`] on every
/// exit path once they are done, including after an error from
/// [`next_batch`]. `close` is idempotent.
///
/// [`close`]: IdentifierCursor::close
/// [`next_batch`]: IdentifierCursor::next_batch
#[async_trait]
pub trait IdentifierCursor<E>: Send {
    /// Fetch the next batch of identifiers.
    ///
    /// Returns `Ok(None)` once the store is exhausted. Batches are never
    /// larger than the batch size the cursor was opened with.
    async fn next_batch(&mut self) -> Result<Option<IdentifierSet>, E>;

    /// Release the server-side resource held by the cursor.
    async fn close(&mut self) -> Result<(), E>;
}
