//! Identifier enumeration.
//!
//! Drains a store's identifier cursor into an in-memory set. The cursor is
//! closed on every path, and a failed enumeration is an error, never a
//! partial or empty set.

use std::fmt::Display;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::errors::PipelineError;
use index_sync_repository::{IdentifierCursor, SearchDestination, SourceStore};
use index_sync_shared::IdentifierSet;

/// Every identifier of one store.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub ids: IdentifierSet,
    /// Number of batches read from the cursor.
    pub batches: usize,
    pub elapsed: Duration,
}

impl Enumeration {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Enumerate every identifier in the destination collection.
#[instrument(skip(destination), fields(backend = destination.backend(), collection = destination.collection()))]
pub async fn enumerate_destination(
    destination: &dyn SearchDestination,
    batch_size: usize,
) -> Result<Enumeration, PipelineError> {
    let cursor = destination
        .open_id_cursor(batch_size)
        .await
        .map_err(|e| PipelineError::enumeration("destination", e.to_string()))?;

    drain(cursor, "destination")
        .await
        .map_err(|e| PipelineError::enumeration("destination", e.to_string()))
}

/// Enumerate every identifier in the source table.
#[instrument(skip(source))]
pub async fn enumerate_source(
    source: &dyn SourceStore,
    batch_size: usize,
) -> Result<Enumeration, PipelineError> {
    let cursor = source
        .open_id_cursor(batch_size)
        .await
        .map_err(|e| PipelineError::enumeration("source", e.to_string()))?;

    drain(cursor, "source")
        .await
        .map_err(|e| PipelineError::enumeration("source", e.to_string()))
}

/// Read a cursor to exhaustion, then close it.
///
/// A close failure after a complete read is only logged: every identifier
/// has already been seen.
pub async fn drain<E: Display>(
    mut cursor: Box<dyn IdentifierCursor<E>>,
    side: &'static str,
) -> Result<Enumeration, E> {
    let started = Instant::now();
    let mut enumeration = Enumeration::default();

    let read = loop {
        match cursor.next_batch().await {
            Ok(Some(batch)) => {
                enumeration.batches += 1;
                enumeration.ids.extend(batch);
                debug!(
                    side,
                    batch = enumeration.batches,
                    total = enumeration.ids.len(),
                    "Read identifier batch"
                );
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    let closed = cursor.close().await;

    match (read, closed) {
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!(side, error = %close_err, "Failed to close cursor after read error");
            }
            Err(e)
        }
        (Ok(()), closed) => {
            if let Err(close_err) = closed {
                warn!(side, error = %close_err, "Failed to close cursor");
            }
            enumeration.elapsed = started.elapsed();
            info!(
                side,
                count = enumeration.ids.len(),
                batches = enumeration.batches,
                elapsed_ms = enumeration.elapsed.as_millis() as u64,
                "Enumerated identifiers"
            );
            Ok(enumeration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use index_sync_shared::RecordId;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedCursor {
        batches: VecDeque<Result<Option<IdentifierSet>, String>>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl IdentifierCursor<String> for ScriptedCursor {
        async fn next_batch(&mut self) -> Result<Option<IdentifierSet>, String> {
            self.batches.pop_front().unwrap_or(Ok(None))
        }

        async fn close(&mut self) -> Result<(), String> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn batch(ids: &[i64]) -> IdentifierSet {
        ids.iter().copied().map(RecordId::from).collect()
    }

    #[tokio::test]
    async fn test_drain_unions_batches_and_closes() {
        let closes = Arc::new(AtomicUsize::new(0));
        let cursor = ScriptedCursor {
            batches: VecDeque::from(vec![Ok(Some(batch(&[1, 2]))), Ok(Some(batch(&[3])))]),
            closes: closes.clone(),
        };

        let enumeration = drain(Box::new(cursor), "source").await.unwrap();

        assert_eq!(enumeration.ids, batch(&[1, 2, 3]));
        assert_eq!(enumeration.batches, 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_error_is_not_an_empty_set() {
        let closes = Arc::new(AtomicUsize::new(0));
        let cursor = ScriptedCursor {
            batches: VecDeque::from(vec![
                Ok(Some(batch(&[1]))),
                Err("connection reset".to_string()),
            ]),
            closes: closes.clone(),
        };

        let result = drain(Box::new(cursor), "destination").await;

        assert_eq!(result.unwrap_err(), "connection reset");
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_empty_store() {
        let cursor = ScriptedCursor {
            batches: VecDeque::new(),
            closes: Arc::new(AtomicUsize::new(0)),
        };

        let enumeration = drain(Box::new(cursor), "destination").await.unwrap();

        assert!(enumeration.is_empty());
        assert_eq!(enumeration.batches, 0);
    }
}
