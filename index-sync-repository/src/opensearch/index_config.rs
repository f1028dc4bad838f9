//! OpenSearch index settings and mappings.
//!
//! The mappings are derived from the document schema so that the index and
//! the normalizer always agree on field types.

use serde_json::{json, Map, Value};

use index_sync_shared::{DocumentSchema, FieldKind};

/// Get the index settings and mappings for a document schema.
///
/// The configuration includes:
/// - **keyword**: `id` and exact-match fields, for filtering and lookups
/// - **text**: full-text fields
/// - **float**: numeric fields
/// - **knn_vector**: dense vector fields; `index.knn` is enabled when any is present
pub fn index_settings(schema: &DocumentSchema) -> Value {
    let mut properties = Map::new();
    properties.insert("id".to_string(), json!({ "type": "keyword" }));

    for field in &schema.fields {
        let mapping = match field.kind {
            FieldKind::Keyword => json!({ "type": "keyword" }),
            FieldKind::Text => json!({ "type": "text" }),
            FieldKind::Number => json!({ "type": "float" }),
            FieldKind::Vector { dims } => json!({
                "type": "knn_vector",
                "dimension": dims
            }),
        };
        properties.insert(field.name.clone(), mapping);
    }

    let has_vectors = schema.vector_fields().next().is_some();

    json!({
        "settings": {
            "index": {
                "number_of_shards": 1,
                "number_of_replicas": 1,
                "knn": has_vectors
            }
        },
        "mappings": {
            "properties": properties
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use index_sync_shared::FieldSpec;

    #[test]
    fn test_index_settings_structure() {
        let settings = index_settings(&DocumentSchema::default());

        assert!(settings["settings"]["index"]["number_of_shards"].is_number());
        assert_eq!(settings["settings"]["index"]["knn"], true);

        let properties = &settings["mappings"]["properties"];
        assert_eq!(properties["id"]["type"], "keyword");
        assert_eq!(properties["barcode"]["type"], "keyword");
        assert_eq!(properties["meta_text"]["type"], "text");
        assert_eq!(properties["price"]["type"], "float");
        assert_eq!(properties["front_image_embeddings"]["type"], "knn_vector");
        assert_eq!(properties["front_image_embeddings"]["dimension"], 512);
    }

    #[test]
    fn test_knn_disabled_without_vectors() {
        let schema = DocumentSchema::new(vec![FieldSpec::text("title")]);
        let settings = index_settings(&schema);

        assert_eq!(settings["settings"]["index"]["knn"], false);
    }
}
