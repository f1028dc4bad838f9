//! Streamed export identifier cursor.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::errors::SearchError;
use crate::interfaces::IdentifierCursor;
use index_sync_shared::{IdentifierSet, RecordId};

type ByteStream = BoxStream<'static, Result<Vec<u8>, reqwest::Error>>;

/// Reads document identifiers from an open `documents/export` response.
///
/// The server walks the collection and streams one JSON document per line;
/// the open HTTP response is the cursor. Each chunk read is bounded by the
/// read timeout.
pub(crate) struct ExportCursor {
    stream: Option<ByteStream>,
    buffer: Vec<u8>,
    pending: VecDeque<RecordId>,
    batch_size: usize,
    read_timeout: Duration,
}

impl ExportCursor {
    pub(crate) fn new(response: reqwest::Response, batch_size: usize, read_timeout: Duration) -> Self {
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Self::from_stream(stream, batch_size, read_timeout)
    }

    fn from_stream(stream: ByteStream, batch_size: usize, read_timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            batch_size: batch_size.max(1),
            read_timeout,
        }
    }

    /// Move every complete line of the buffer into `pending`.
    fn drain_lines(&mut self) -> Result<(), SearchError> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(id) = parse_export_line(&line)? {
                self.pending.push_back(id);
            }
        }
        Ok(())
    }

    fn take_batch(&mut self) -> IdentifierSet {
        let count = self.pending.len().min(self.batch_size);
        self.pending.drain(..count).collect()
    }
}

/// Parse one export line into its document identifier. Blank lines are skipped.
pub(crate) fn parse_export_line(line: &[u8]) -> Result<Option<RecordId>, SearchError> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let doc: Value = serde_json::from_slice(trimmed)?;
    match doc.get("id") {
        Some(Value::String(id)) => Ok(Some(RecordId::from(id.as_str()))),
        Some(Value::Number(id)) => Ok(Some(RecordId::from(id.to_string()))),
        _ => Err(SearchError::parse("exported document without id")),
    }
}

#[async_trait]
impl IdentifierCursor<SearchError> for ExportCursor {
    async fn next_batch(&mut self) -> Result<Option<IdentifierSet>, SearchError> {
        while self.pending.len() < self.batch_size {
            let Some(stream) = self.stream.as_mut() else {
                break;
            };

            let chunk = tokio::time::timeout(self.read_timeout, stream.next())
                .await
                .map_err(|_| SearchError::timeout("Typesense export stalled"))?;

            match chunk {
                Some(bytes) => {
                    self.buffer.extend_from_slice(&bytes?);
                    self.drain_lines()?;
                }
                None => {
                    self.stream = None;
                    // Final line may have no trailing newline.
                    let rest = std::mem::take(&mut self.buffer);
                    if let Some(id) = parse_export_line(&rest)? {
                        self.pending.push_back(id);
                    }
                }
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let batch = self.take_batch();
        debug!(count = batch.len(), "Read exported identifier batch");
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<(), SearchError> {
        // Dropping the body stream closes the connection.
        self.stream = None;
        self.buffer.clear();
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn cursor(chunks: &[&str], batch_size: usize) -> ExportCursor {
        let chunks: Vec<Result<Vec<u8>, reqwest::Error>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        ExportCursor::from_stream(
            stream::iter(chunks).boxed(),
            batch_size,
            Duration::from_secs(30),
        )
    }

    fn ids(values: &[&str]) -> IdentifierSet {
        values.iter().map(|v| RecordId::from(*v)).collect()
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let mut cursor = cursor(
            &[
                "{\"id\":\"1\"}\n{\"i",
                "d\":\"2\"}\n{\"id\":\"3\"}\n",
                "{\"id\":\"4\"}",
            ],
            2,
        );

        assert_eq!(cursor.next_batch().await.unwrap(), Some(ids(&["1", "2"])));
        assert_eq!(cursor.next_batch().await.unwrap(), Some(ids(&["3", "4"])));
        assert_eq!(cursor.next_batch().await.unwrap(), None);
        assert_eq!(cursor.next_batch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_chunk_larger_than_batch() {
        let body: String = (1..=5).map(|i| format!("{{\"id\":{}}}\n", i)).collect();
        let mut cursor = cursor(&[&body, "\n"], 2);

        let mut sizes = Vec::new();
        let mut seen = IdentifierSet::new();
        while let Some(batch) = cursor.next_batch().await.unwrap() {
            sizes.push(batch.len());
            seen.extend(batch);
        }

        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(seen, ids(&["1", "2", "3", "4", "5"]));
    }

    #[tokio::test]
    async fn test_empty_export() {
        let mut cursor = cursor(&[], 10);
        assert_eq!(cursor.next_batch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_line_is_an_error() {
        let mut cursor = cursor(&["{\"id\":\"1\"}\n{\"barcode\":\"x\"}\n"], 10);
        assert!(matches!(
            cursor.next_batch().await,
            Err(SearchError::ParseError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_export_times_out() {
        let first: Result<Vec<u8>, reqwest::Error> = Ok(b"{\"id\":\"1\"}\n".to_vec());
        let mut cursor = ExportCursor::from_stream(
            stream::iter(vec![first]).chain(stream::pending()).boxed(),
            10,
            Duration::from_secs(30),
        );

        assert!(matches!(
            cursor.next_batch().await,
            Err(SearchError::TimeoutError(_))
        ));
    }

    #[tokio::test]
    async fn test_close_discards_unread_identifiers() {
        let mut cursor = cursor(&["{\"id\":\"1\"}\n{\"id\":\"2\"}\n{\"id\":\"3\"}\n"], 1);

        assert_eq!(cursor.next_batch().await.unwrap(), Some(ids(&["1"])));
        cursor.close().await.unwrap();
        cursor.close().await.unwrap();
        assert_eq!(cursor.next_batch().await.unwrap(), None);
    }

    #[test]
    fn test_parse_export_line() {
        let id = parse_export_line(br#"{"id":"124","barcode":"0075678"}"#).unwrap();
        assert_eq!(id, Some(RecordId::from("124")));
    }

    #[test]
    fn test_parse_blank_export_line() {
        assert_eq!(parse_export_line(b"  \n").unwrap(), None);
    }

    #[test]
    fn test_parse_export_line_without_id() {
        assert!(matches!(
            parse_export_line(br#"{"barcode":"1"}"#),
            Err(SearchError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_export_line_invalid_json() {
        assert!(parse_export_line(b"{not json").is_err());
    }
}
