//! Scroll-based identifier cursor.

use async_trait::async_trait;
use opensearch::{ClearScrollParts, OpenSearch, ScrollParts, SearchParts};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::SearchError;
use crate::interfaces::IdentifierCursor;
use index_sync_shared::{IdentifierSet, RecordId};

/// Pages through every document `_id` of an index with the scroll API.
///
/// The scroll context lives on the cluster until it expires or is cleared;
/// [`close`](IdentifierCursor::close) clears it.
pub(crate) struct ScrollCursor {
    client: OpenSearch,
    index: String,
    ttl: String,
    batch_size: usize,
    scroll_id: Option<String>,
    started: bool,
    exhausted: bool,
}

impl ScrollCursor {
    pub(crate) fn new(client: OpenSearch, index: String, ttl: String, batch_size: usize) -> Self {
        Self {
            client,
            index,
            ttl,
            batch_size,
            scroll_id: None,
            started: false,
            exhausted: false,
        }
    }

    async fn first_page(&self) -> Result<Value, SearchError> {
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .scroll(&self.ttl)
            .size(self.batch_size as i64)
            .body(json!({
                "query": { "match_all": {} },
                "_source": false,
                "sort": ["_doc"]
            }))
            .send()
            .await?;

        read_json(response).await
    }

    async fn next_page(&self, scroll_id: &str) -> Result<Value, SearchError> {
        let response = self
            .client
            .scroll(ScrollParts::None)
            .body(json!({
                "scroll": self.ttl,
                "scroll_id": scroll_id
            }))
            .send()
            .await?;

        read_json(response).await
    }
}

async fn read_json(response: opensearch::http::response::Response) -> Result<Value, SearchError> {
    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SearchError::status(status.as_u16(), body));
    }
    response.json::<Value>().await.map_err(SearchError::from)
}

/// Extract the scroll id and the hit identifiers from a search/scroll page.
pub(crate) fn parse_scroll_page(page: &Value) -> Result<(Option<String>, IdentifierSet), SearchError> {
    let scroll_id = page
        .get("_scroll_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let hits = page
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::parse("scroll response has no hits.hits array"))?;

    let mut ids = IdentifierSet::with_capacity(hits.len());
    for hit in hits {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| SearchError::parse("scroll hit without _id"))?;
        ids.insert(RecordId::from(id));
    }

    Ok((scroll_id, ids))
}

/// The request that fetches the next scroll page.
#[derive(Debug, PartialEq, Eq)]
enum PageRequest {
    First,
    Next(String),
}

impl ScrollCursor {
    /// What to ask for next, or `None` once the scroll is exhausted.
    fn next_request(&self) -> Result<Option<PageRequest>, SearchError> {
        if self.exhausted {
            return Ok(None);
        }
        match (&self.scroll_id, self.started) {
            (_, false) => Ok(Some(PageRequest::First)),
            (Some(id), true) => Ok(Some(PageRequest::Next(id.clone()))),
            (None, true) => Err(SearchError::query("scroll context lost between pages")),
        }
    }

    /// Record a received page. An empty page ends the scroll.
    fn accept_page(&mut self, page: &Value) -> Result<Option<IdentifierSet>, SearchError> {
        self.started = true;

        let (scroll_id, ids) = parse_scroll_page(page)?;
        if scroll_id.is_some() {
            self.scroll_id = scroll_id;
        }

        if ids.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(ids))
    }
}

#[async_trait]
impl IdentifierCursor<SearchError> for ScrollCursor {
    async fn next_batch(&mut self) -> Result<Option<IdentifierSet>, SearchError> {
        let page = match self.next_request()? {
            None => return Ok(None),
            Some(PageRequest::First) => self.first_page().await?,
            Some(PageRequest::Next(id)) => self.next_page(&id).await?,
        };

        let ids = self.accept_page(&page)?;
        if let Some(ids) = &ids {
            debug!(index = %self.index, count = ids.len(), "Scrolled identifier page");
        }
        Ok(ids)
    }

    async fn close(&mut self) -> Result<(), SearchError> {
        self.exhausted = true;
        let Some(scroll_id) = self.scroll_id.take() else {
            return Ok(());
        };

        let response = self
            .client
            .clear_scroll(ClearScrollParts::None)
            .body(json!({ "scroll_id": [scroll_id] }))
            .send()
            .await?;

        let status = response.status_code();
        // 404 means the context already expired, which is what we wanted.
        if !status.is_success() && status.as_u16() != 404 {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Failed to clear scroll context");
            return Err(SearchError::status(status.as_u16(), body));
        }

        debug!(index = %self.index, "Cleared scroll context");
        Ok(())
    }
}
