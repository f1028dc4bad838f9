//! Record normalizer implementation.
//!
//! Reshapes fetched source records into destination documents according to
//! the document schema.

use serde_json::Value;
use tracing::{debug, instrument};

use index_sync_shared::{
    DocumentSchema, DocumentValue, FieldKind, FieldValue, NormalizedDocument, RecordId,
    SourceRecord,
};

/// Documents ready for indexing, and the records that cannot be indexed.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub documents: Vec<NormalizedDocument>,
    /// Records missing a required field, with the reason.
    pub rejected: Vec<(RecordId, String)>,
}

/// Normalizer that turns source records into search documents.
///
/// Normalization is pure and deterministic: a value that cannot be coerced
/// to its field's type is omitted from the document, never sent as null.
pub struct RecordNormalizer {
    schema: DocumentSchema,
}

impl RecordNormalizer {
    pub fn new(schema: DocumentSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    /// Normalize a batch and split out documents missing required fields.
    #[instrument(skip(self, records), fields(record_count = records.len()))]
    pub fn normalize_batch(&self, records: &[SourceRecord]) -> NormalizedBatch {
        let mut batch = NormalizedBatch {
            documents: Vec::with_capacity(records.len()),
            rejected: Vec::new(),
        };

        for record in records {
            let doc = self.normalize(record);
            let missing = self.missing_required(&doc);
            if missing.is_empty() {
                batch.documents.push(doc);
            } else {
                debug!(id = %doc.id, missing = ?missing, "Record missing required fields");
                batch.rejected.push((
                    doc.id,
                    format!("missing required field: {}", missing.join(", ")),
                ));
            }
        }

        debug!(
            documents = batch.documents.len(),
            rejected = batch.rejected.len(),
            "Normalized record batch"
        );
        batch
    }

    /// Normalize a single record.
    pub fn normalize(&self, record: &SourceRecord) -> NormalizedDocument {
        let mut doc = NormalizedDocument::new(record.id.clone());

        for field in &self.schema.fields {
            let raw = record.field(&field.name);
            if raw.is_null() {
                continue;
            }

            let value = match field.kind {
                FieldKind::Keyword | FieldKind::Text => to_text(raw).map(DocumentValue::Text),
                FieldKind::Number => to_number(raw).map(DocumentValue::Number),
                FieldKind::Vector { dims } => to_vector(raw, dims).map(DocumentValue::Vector),
            };

            if let Some(value) = value {
                doc.fields.insert(field.name.clone(), value);
            }
        }

        doc
    }

    /// Required schema fields absent from `doc`.
    pub fn missing_required<'a>(&'a self, doc: &NormalizedDocument) -> Vec<&'a str> {
        self.schema
            .required_fields()
            .filter(|name| !doc.contains(name))
            .collect()
    }
}

fn to_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(s) => Some(s.clone()),
        FieldValue::Json(Value::String(s)) => Some(s.clone()),
        FieldValue::Json(Value::Number(n)) => Some(n.to_string()),
        FieldValue::Json(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

fn to_number(value: &FieldValue) -> Option<f64> {
    let n = match value {
        FieldValue::Text(s) | FieldValue::Json(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        FieldValue::Json(Value::Number(n)) => n.as_f64()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Accepts a flat numeric array, or a list of numeric arrays flattened one
/// level. The result must have exactly `dims` components.
fn to_vector(value: &FieldValue, dims: usize) -> Option<Vec<f32>> {
    let FieldValue::Json(Value::Array(items)) = value else {
        return None;
    };

    let components: Vec<&Value> = if items.iter().all(Value::is_number) {
        items.iter().collect()
    } else if !items.is_empty() && items.iter().all(Value::is_array) {
        let mut flat = Vec::new();
        for inner in items {
            let inner = inner.as_array()?;
            if !inner.iter().all(Value::is_number) {
                return None;
            }
            flat.extend(inner);
        }
        flat
    } else {
        return None;
    };

    if components.len() != dims {
        return None;
    }

    components
        .into_iter()
        .map(|v| v.as_f64().map(|f| f as f32).filter(|f| f.is_finite()))
        .collect()
}
