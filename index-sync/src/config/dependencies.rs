//! Dependency initialization and wiring for a sync run.

use std::sync::Arc;
use tracing::info;

use crate::config::{DestinationConfig, SyncConfig};
use crate::SyncError;
use index_sync_pipeline::Orchestrator;
use index_sync_repository::{
    OpenSearchDestination, PostgresSource, SearchDestination, SourceStore, TypesenseDestination,
};
use index_sync_shared::DocumentSchema;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Shared with the orchestrator; kept so the connection can be closed if
    /// the run is interrupted.
    pub source: Arc<dyn SourceStore>,
}

impl Dependencies {
    /// Connect to both stores and wire the orchestrator.
    ///
    /// Fails fast if either store is unreachable. The source connection is
    /// closed again when the destination check fails.
    pub async fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let schema = DocumentSchema::listings(config.embedding_dims);

        info!(
            pg_host = %config.postgres.host,
            pg_database = %config.postgres.database,
            table = %config.postgres.table,
            destination = ?config.destination_kind(),
            "Initializing dependencies"
        );

        let source = PostgresSource::connect(config.postgres, schema.clone())
            .await
            .map_err(|e| SyncError::connection(format!("Failed to connect to Postgres: {}", e)))?;

        if let Err(e) = source.health_check().await {
            source.close().await;
            return Err(SyncError::connection(format!("Postgres health check failed: {}", e)));
        }
        info!("Postgres connection verified");

        let destination = match connect_destination(config.destination, schema.clone()).await {
            Ok(destination) => destination,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        let source: Arc<dyn SourceStore> = Arc::new(source);
        let orchestrator =
            Orchestrator::with_config(source.clone(), destination, schema, config.pipeline);

        Ok(Self {
            orchestrator,
            source,
        })
    }
}

/// Build the selected destination and verify it is healthy.
async fn connect_destination(
    config: DestinationConfig,
    schema: DocumentSchema,
) -> Result<Arc<dyn SearchDestination>, SyncError> {
    let destination: Arc<dyn SearchDestination> = match config {
        DestinationConfig::Typesense(config) => Arc::new(
            TypesenseDestination::new(config, schema)
                .map_err(|e| SyncError::config(format!("Failed to create Typesense client: {}", e)))?,
        ),
        DestinationConfig::OpenSearch(config) => Arc::new(
            OpenSearchDestination::new(config, schema).map_err(|e| {
                SyncError::config(format!("Failed to create OpenSearch client: {}", e))
            })?,
        ),
    };

    let healthy = destination.health_check().await.map_err(|e| {
        SyncError::connection(format!(
            "{} health check failed: {}",
            destination.backend(),
            e
        ))
    })?;

    if !healthy {
        return Err(SyncError::connection(format!(
            "{} reports itself unhealthy",
            destination.backend()
        )));
    }

    info!(
        backend = destination.backend(),
        collection = destination.collection(),
        "Destination connection verified"
    );
    Ok(destination)
}
