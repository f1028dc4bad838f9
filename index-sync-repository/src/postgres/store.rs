//! Postgres source store.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::errors::SourceError;
use crate::interfaces::{IdentifierCursor, SourceStore};
use crate::postgres::cursor::PgIdCursor;
use crate::postgres::queries::{count_query, fetch_records_query, id_type_query};
use index_sync_shared::{DocumentSchema, FieldValue, RecordId, SourceRecord};

/// Postgres-backed source of truth.
///
/// Holds a single-connection pool: a run is single-threaded, and the pool
/// gives a handle that can be shared with cursors and closed explicitly.
pub struct PostgresSource {
    pool: PgPool,
    config: PostgresConfig,
    schema: DocumentSchema,
    fetch_sql: String,
}

impl PostgresSource {
    /// Connect and verify the primary table.
    ///
    /// Fails if the server is unreachable, credentials are rejected, or the
    /// primary table has no `id` column.
    pub async fn connect(config: PostgresConfig, schema: DocumentSchema) -> Result<Self, SourceError> {
        let ssl_mode = PgSslMode::from_str(&config.ssl_mode)
            .map_err(|e| SourceError::connection(format!("Invalid sslmode: {}", e)))?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(ssl_mode)
            .options([(
                "statement_timeout",
                format!("{}ms", config.statement_timeout.as_millis()),
            )]);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.timeouts.connect)
            .connect_with(options)
            .await
            .map_err(|e| SourceError::connection(e.to_string()))?;

        let id_type: Option<String> = sqlx::query_scalar(id_type_query())
            .bind(&config.table)
            .fetch_optional(&pool)
            .await
            .map_err(SourceError::from)?;

        let Some(id_type) = id_type else {
            pool.close().await;
            return Err(SourceError::query(format!(
                "Table {} has no id column",
                config.table
            )));
        };

        let fetch_sql = fetch_records_query(
            &config.table,
            &config.embeddings_table,
            &config.embeddings_foreign_key,
            &id_type,
            &schema,
        );

        info!(
            host = %config.host,
            database = %config.database,
            table = %config.table,
            id_type = %id_type,
            "Connected to Postgres"
        );

        Ok(Self {
            pool,
            config,
            schema,
            fetch_sql,
        })
    }

    fn decode_row(&self, row: &PgRow) -> Result<SourceRecord, SourceError> {
        let id: String = row.try_get("id")?;
        let mut record = SourceRecord::new(id);

        for field in self.schema.scalar_fields() {
            let value: Option<String> = row.try_get(field.name.as_str())?;
            record.fields.insert(field.name.clone(), FieldValue::from(value));
        }
        for field in self.schema.vector_fields() {
            let value: Option<Value> = row.try_get(field.name.as_str())?;
            record
                .fields
                .insert(field.name.clone(), value.map_or(FieldValue::Null, FieldValue::Json));
        }

        Ok(record)
    }
}

#[async_trait]
impl SourceStore for PostgresSource {
    async fn health_check(&self) -> Result<(), SourceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn count_records(&self) -> Result<u64, SourceError> {
        let count: i64 = sqlx::query_scalar(&count_query(&self.config.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn open_id_cursor(
        &self,
        batch_size: usize,
    ) -> Result<Box<dyn IdentifierCursor<SourceError>>, SourceError> {
        let conn = self.pool.acquire().await?;
        let cursor = PgIdCursor::open(conn, &self.config.table, batch_size).await?;
        Ok(Box::new(cursor))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn fetch_records(&self, ids: &[RecordId]) -> Result<Vec<SourceRecord>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let params: Vec<&str> = ids.iter().map(RecordId::as_str).collect();
        let rows = sqlx::query(&self.fetch_sql)
            .bind(params)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        let mut seen = std::collections::HashSet::with_capacity(rows.len());
        for row in &rows {
            let record = self.decode_row(row)?;
            // A record with several embedding rows comes back once per row.
            if seen.insert(record.id.clone()) {
                records.push(record);
            }
        }

        debug!(requested = ids.len(), fetched = records.len(), "Fetched records");
        Ok(records)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed Postgres connection");
    }
}
