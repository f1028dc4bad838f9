//! Typesense destination implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TypesenseConfig;
use crate::errors::SearchError;
use crate::interfaces::{IdentifierCursor, SearchDestination};
use crate::types::{BatchOperationResult, BatchOperationSummary, CollectionStatus};
use crate::typesense::collection_schema::collection_schema;
use crate::typesense::export::ExportCursor;
use index_sync_shared::{DocumentSchema, NormalizedDocument, RecordId};

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// Typesense search destination.
pub struct TypesenseDestination {
    http: Client,
    base_url: Url,
    config: TypesenseConfig,
    schema: DocumentSchema,
}

impl TypesenseDestination {
    /// Create a new Typesense destination.
    ///
    /// No request is sent; use [`SearchDestination::health_check`] to verify
    /// the node is reachable.
    pub fn new(config: TypesenseConfig, schema: DocumentSchema) -> Result<Self, SearchError> {
        let base_url =
            Url::parse(&config.base_url()).map_err(|e| SearchError::config(e.to_string()))?;

        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| SearchError::config("Typesense API key is not a valid header value"))?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);

        let http = Client::builder()
            .connect_timeout(config.timeouts.connect)
            .default_headers(headers)
            .build()
            .map_err(|e| SearchError::config(e.to_string()))?;

        info!(
            url = %base_url,
            collection = %config.collection,
            "Created Typesense client"
        );

        Ok(Self {
            http,
            base_url,
            config,
            schema,
        })
    }

    /// Build an endpoint URL from path segments, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SearchError::config("Typesense base URL cannot have a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn documents_endpoint(&self, tail: &[&str]) -> Result<Url, SearchError> {
        let mut segments = vec!["collections", self.config.collection.as_str(), "documents"];
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }
}

/// Render documents as the JSONL body of an import request.
fn import_body(documents: &[NormalizedDocument]) -> Result<String, SearchError> {
    let mut body = String::new();
    for doc in documents {
        let line = serde_json::to_string(&Value::Object(doc.to_json()))
            .map_err(|e| SearchError::SerializationError(e.to_string()))?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}

/// Map an import response (one JSON result per line, in request order) to
/// per-document outcomes.
fn parse_import_response(
    body: &str,
    documents: &[NormalizedDocument],
) -> Result<BatchOperationSummary, SearchError> {
    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() != documents.len() {
        return Err(SearchError::bulk_index(format!(
            "import response has {} lines for {} documents",
            lines.len(),
            documents.len()
        )));
    }

    let mut results = Vec::with_capacity(documents.len());
    for (line, doc) in lines.into_iter().zip(documents) {
        let outcome: Value = serde_json::from_str(line)?;
        if outcome.get("success").and_then(Value::as_bool) == Some(true) {
            results.push(BatchOperationResult::succeeded(doc.id.clone()));
        } else {
            let reason = outcome
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown import error");
            results.push(BatchOperationResult::failed(doc.id.clone(), reason));
        }
    }

    Ok(BatchOperationSummary::from_results(results))
}

async fn error_body(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    (status, response.text().await.unwrap_or_default())
}

#[async_trait]
impl SearchDestination for TypesenseDestination {
    fn backend(&self) -> &'static str {
        "typesense"
    }

    fn collection(&self) -> &str {
        &self.config.collection
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .http
            .get(self.endpoint(&["health"])?)
            .timeout(self.config.timeouts.connect)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let body: Value = response.json().await?;
        Ok(body.get("ok").and_then(Value::as_bool).unwrap_or(false))
    }

    #[instrument(skip(self), fields(collection = %self.config.collection))]
    async fn ensure_collection(&self) -> Result<CollectionStatus, SearchError> {
        let response = self
            .http
            .get(self.endpoint(&["collections", &self.config.collection])?)
            .timeout(self.config.timeouts.read)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                info!("Collection already exists, skipping creation");
                return Ok(CollectionStatus::AlreadyExists);
            }
            StatusCode::NOT_FOUND => {}
            _ => {
                let (status, body) = error_body(response).await;
                return Err(SearchError::status(status, body));
            }
        }

        let response = self
            .http
            .post(self.endpoint(&["collections"])?)
            .timeout(self.config.timeouts.read)
            .json(&collection_schema(&self.config.collection, &self.schema))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!("Collection created");
                Ok(CollectionStatus::Created)
            }
            StatusCode::CONFLICT => {
                info!("Collection already exists, skipping creation");
                Ok(CollectionStatus::AlreadyExists)
            }
            _ => {
                let (status, body) = error_body(response).await;
                error!(status = status, body = %body, "Collection creation failed");
                Err(SearchError::index_creation(format!(
                    "Collection creation failed with status {}: {}",
                    status, body
                )))
            }
        }
    }

    async fn open_id_cursor(
        &self,
        batch_size: usize,
    ) -> Result<Box<dyn IdentifierCursor<SearchError>>, SearchError> {
        let mut url = self.documents_endpoint(&["export"])?;
        url.query_pairs_mut().append_pair("include_fields", "id");

        let response = tokio::time::timeout(self.config.timeouts.read, self.http.get(url).send())
            .await
            .map_err(|_| SearchError::timeout("Typesense export did not start"))??;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(SearchError::status(status, body));
        }

        Ok(Box::new(ExportCursor::new(
            response,
            batch_size,
            self.config.timeouts.read,
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

        let mut url = self.documents_endpoint(&["import"])?;
        url.query_pairs_mut().append_pair("action", "upsert");

        let response = self
            .http
            .post(url)
            .timeout(self.config.timeouts.read)
            .header(CONTENT_TYPE, "text/plain")
            .body(import_body(documents)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            warn!(status = status, "Import request rejected");
            return Err(SearchError::status(status, body));
        }

        let body = response.text().await?;
        let summary = parse_import_response(&body, documents)?;

        debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Import request completed"
        );
        Ok(summary)
    }

    async fn delete_document(&self, id: &RecordId) -> Result<(), SearchError> {
        let response = self
            .http
            .delete(self.documents_endpoint(&[id.as_str()])?)
            .timeout(self.config.timeouts.read)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                debug!(id = %id, "Document deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(SearchError::NotFound(id.to_string())),
            _ => {
                let (status, body) = error_body(response).await;
                Err(SearchError::delete(format!(
                    "Delete failed with status {}: {}",
                    status, body
                )))
            }
        }
    }
}
