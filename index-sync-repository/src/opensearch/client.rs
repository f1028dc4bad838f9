//! OpenSearch destination implementation.
//!
//! This module provides the concrete implementation of `SearchDestination`
//! using the OpenSearch Rust client.

use std::fs;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    cert::{Certificate, CertificateValidation},
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, DeleteParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::OpenSearchConfig;
use crate::errors::SearchError;
use crate::interfaces::{IdentifierCursor, SearchDestination};
use crate::opensearch::index_config::index_settings;
use crate::opensearch::scroll::ScrollCursor;
use crate::types::{BatchOperationResult, BatchOperationSummary, CollectionStatus};
use index_sync_shared::{DocumentSchema, NormalizedDocument, RecordId};

/// OpenSearch search destination.
///
/// Documents are stored with `_id` equal to the record identifier, so an
/// upsert is a plain bulk `index` action and deletes address documents by id.
///
/// # Example
///
/// ```ignore
/// let config = OpenSearchConfig::new("http://localhost:9200", "listings");
/// let destination = OpenSearchDestination::new(config, DocumentSchema::default())?;
/// destination.ensure_collection().await?;
/// ```
pub struct OpenSearchDestination {
    client: OpenSearch,
    config: OpenSearchConfig,
    schema: DocumentSchema,
}

impl OpenSearchDestination {
    /// Create a new OpenSearch destination.
    ///
    /// No request is sent; use [`SearchDestination::health_check`] to verify
    /// the cluster is reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchDestination)` - A new destination instance
    /// * `Err(SearchError)` - If the URL, credentials or certificate are invalid
    pub fn new(config: OpenSearchConfig, schema: DocumentSchema) -> Result<Self, SearchError> {
        let parsed_url = Url::parse(&config.url).map_err(|e| SearchError::config(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.timeouts.read);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.auth(Credentials::Basic(username.clone(), password.clone()));
        }

        if let Some(path) = &config.ca_cert_path {
            let pem = fs::read(path).map_err(|e| {
                SearchError::config(format!("Failed to read CA certificate {}: {}", path.display(), e))
            })?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| SearchError::config(format!("Invalid CA certificate: {}", e)))?;
            builder = builder.cert_validation(CertificateValidation::Full(cert));
        }

        let transport = builder
            .build()
            .map_err(|e| SearchError::config(e.to_string()))?;

        info!(
            url = %config.url,
            index = %config.index,
            "Created OpenSearch client"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
            config,
            schema,
        })
    }

    async fn index_exists(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&self.config.index]))
            .send()
            .await?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::status(status, body))
            }
        }
    }
}

/// Build the NDJSON body of a bulk upsert request.
fn bulk_body(index: &str, documents: &[NormalizedDocument]) -> Vec<JsonBody<Value>> {
    let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
    for doc in documents {
        body.push(json!({ "index": { "_index": index, "_id": doc.id.as_str() } }).into());
        body.push(Value::Object(doc.to_json()).into());
    }
    body
}

/// Map a `_bulk` response to per-document outcomes.
///
/// Items come back in request order, one per action.
fn parse_bulk_response(
    response: &Value,
    documents: &[NormalizedDocument],
) -> Result<BatchOperationSummary, SearchError> {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::parse("bulk response has no items array"))?;

    if items.len() != documents.len() {
        return Err(SearchError::bulk_index(format!(
            "bulk response has {} items for {} documents",
            items.len(),
            documents.len()
        )));
    }

    let results = items
        .iter()
        .zip(documents)
        .map(|(item, doc)| {
            let action = item.get("index").unwrap_or(item);
            match action.get("error") {
                Some(error) => {
                    let reason = error
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string());
                    BatchOperationResult::failed(doc.id.clone(), reason)
                }
                None => BatchOperationResult::succeeded(doc.id.clone()),
            }
        })
        .collect();

    Ok(BatchOperationSummary::from_results(results))
}

#[async_trait]
impl SearchDestination for OpenSearchDestination {
    fn backend(&self) -> &'static str {
        "opensearch"
    }

    fn collection(&self) -> &str {
        &self.config.index
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let ping = tokio::time::timeout(self.config.timeouts.connect, self.client.ping().send())
            .await
            .map_err(|_| SearchError::timeout("OpenSearch ping timed out"))??;

        Ok(ping.status_code().is_success())
    }

    #[instrument(skip(self), fields(index = %self.config.index))]
    async fn ensure_collection(&self) -> Result<CollectionStatus, SearchError> {
        if self.index_exists().await? {
            info!("Index already exists, skipping creation");
            return Ok(CollectionStatus::AlreadyExists);
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.config.index))
            .body(index_settings(&self.schema))
            .send()
            .await?;

        let status = response.status_code();
        if status.is_success() {
            info!("Index created");
            return Ok(CollectionStatus::Created);
        }

        let body = response.text().await.unwrap_or_default();
        // Lost a creation race with another client.
        if body.contains("resource_already_exists_exception") {
            info!("Index already exists, skipping creation");
            return Ok(CollectionStatus::AlreadyExists);
        }

        error!(status = %status, body = %body, "Index creation failed");
        Err(SearchError::index_creation(format!(
            "Index creation failed with status {}: {}",
            status, body
        )))
    }

    async fn open_id_cursor(
        &self,
        batch_size: usize,
    ) -> Result<Box<dyn IdentifierCursor<SearchError>>, SearchError> {
        Ok(Box::new(ScrollCursor::new(
            self.client.clone(),
            self.config.index.clone(),
            self.config.scroll_ttl.clone(),
            batch_size,
        )))
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn bulk_upsert(
        &self,
        documents: &[NormalizedDocument],
    ) -> Result<BatchOperationSummary, SearchError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(&self.config.index))
            .body(bulk_body(&self.config.index, documents))
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Bulk request rejected");
            return Err(SearchError::status(status.as_u16(), body));
        }

        let body: Value = response.json().await?;
        let summary = parse_bulk_response(&body, documents)?;

        debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk request completed"
        );
        Ok(summary)
    }

    async fn delete_document(&self, id: &RecordId) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.config.index, id.as_str()))
            .send()
            .await?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::delete(format!(
                "Delete failed with status {}: {}",
                status, body
            )));
        }

        debug!(id = %id, "Document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index_sync_shared::DocumentValue;

    fn doc(id: &str) -> NormalizedDocument {
        let mut doc = NormalizedDocument::new(RecordId::from(id));
        doc.fields
            .insert("barcode".to_string(), DocumentValue::Text(format!("bc-{}", id)));
        doc
    }

    #[test]
    fn test_bulk_body_pairs_action_and_source() {
        let body = bulk_body("listings", &[doc("1"), doc("2")]);
        assert_eq!(body.len(), 4);
    }

    #[test]
    fn test_parse_bulk_response_counts_per_document_errors() {
        let documents = vec![doc("1"), doc("2"), doc("3")];
        let response = json!({
            "took": 5,
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "_id": "2", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [front_image_embeddings]"
                } } },
                { "index": { "_id": "3", "status": 200 } }
            ]
        });

        let summary = parse_bulk_response(&response, &documents).unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        let failure = summary.failures().next().unwrap();
        assert_eq!(failure.id, RecordId::from("2"));
        assert!(failure.error.as_deref().unwrap().contains("front_image_embeddings"));
    }

    #[test]
    fn test_parse_bulk_response_rejects_item_count_mismatch() {
        let response = json!({ "items": [ { "index": { "_id": "1", "status": 201 } } ] });
        let result = parse_bulk_response(&response, &[doc("1"), doc("2")]);
        assert!(matches!(result, Err(SearchError::BulkIndexError(_))));
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let config = OpenSearchConfig::new("not a url", "listings");
        let result = OpenSearchDestination::new(config, DocumentSchema::default());
        assert!(matches!(result, Err(SearchError::ConfigError(_))));
    }
}
