//! Typesense collection schema.

use serde_json::{json, Value};

use index_sync_shared::{DocumentSchema, FieldKind};

/// Build the collection creation body for a document schema.
///
/// `id` is implicit in Typesense and is not declared.
pub fn collection_schema(name: &str, schema: &DocumentSchema) -> Value {
    let fields: Vec<Value> = schema
        .fields
        .iter()
        .map(|field| {
            let mut spec = match field.kind {
                FieldKind::Keyword => json!({ "name": field.name, "type": "string", "facet": true }),
                FieldKind::Text => json!({ "name": field.name, "type": "string" }),
                FieldKind::Number => json!({ "name": field.name, "type": "float" }),
                FieldKind::Vector { dims } => {
                    json!({ "name": field.name, "type": "float[]", "num_dim": dims })
                }
            };
            if field.optional {
                spec["optional"] = json!(true);
            }
            spec
        })
        .collect();

    json!({
        "name": name,
        "fields": fields
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_schema_fields() {
        let body = collection_schema("listings", &DocumentSchema::default());

        assert_eq!(body["name"], "listings");
        let fields = body["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 8);

        let price = fields.iter().find(|f| f["name"] == "price").unwrap();
        assert_eq!(price["type"], "float");
        assert_eq!(price["optional"], true);

        let barcode = fields.iter().find(|f| f["name"] == "barcode").unwrap();
        assert_eq!(barcode["type"], "string");
        assert!(barcode.get("optional").is_none());

        let embedding = fields
            .iter()
            .find(|f| f["name"] == "front_image_embeddings")
            .unwrap();
        assert_eq!(embedding["type"], "float[]");
        assert_eq!(embedding["num_dim"], 512);
    }
}
