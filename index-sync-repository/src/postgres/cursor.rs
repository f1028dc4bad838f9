//! Server-side identifier cursor.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Executor, Postgres, Row};
use tracing::{debug, warn};

use crate::errors::SourceError;
use crate::interfaces::IdentifierCursor;
use crate::postgres::queries::{declare_cursor, fetch_forward, END_CURSOR};
use index_sync_shared::{IdentifierSet, RecordId};

/// Walks the primary table's identifiers through a declared SQL cursor.
///
/// The cursor lives in a read-only repeatable-read transaction on a
/// dedicated pooled connection, so the server keeps the position and every
/// row is visited exactly once against one snapshot.
pub(crate) struct PgIdCursor {
    conn: Option<PoolConnection<Postgres>>,
    batch_size: usize,
    exhausted: bool,
}

impl PgIdCursor {
    pub(crate) async fn open(
        mut conn: PoolConnection<Postgres>,
        table: &str,
        batch_size: usize,
    ) -> Result<Self, SourceError> {
        if let Err(e) = (&mut *conn).execute(sqlx::raw_sql(&declare_cursor(table))).await {
            // The connection may be mid-transaction; do not hand it back to the pool.
            let _ = conn.detach();
            return Err(e.into());
        }

        debug!(table = %table, batch_size = batch_size, "Declared identifier cursor");
        Ok(Self {
            conn: Some(conn),
            batch_size: batch_size.max(1),
            exhausted: false,
        })
    }
}

#[async_trait]
impl IdentifierCursor<SourceError> for PgIdCursor {
    async fn next_batch(&mut self) -> Result<Option<IdentifierSet>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }
        let conn = self.conn.as_mut().ok_or(SourceError::Closed)?;

        let rows = (&mut **conn)
            .fetch_all(sqlx::raw_sql(&fetch_forward(self.batch_size)))
            .await?;

        if rows.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        let mut ids = IdentifierSet::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get(0)?;
            ids.insert(RecordId::from(id));
        }
        Ok(Some(ids))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.exhausted = true;
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        match (&mut *conn).execute(sqlx::raw_sql(END_CURSOR)).await {
            Ok(_) => {
                debug!("Closed identifier cursor");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to end cursor transaction, discarding connection");
                let _ = conn.detach();
                Err(e.into())
            }
        }
    }
}
