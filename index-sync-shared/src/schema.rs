//! Destination document schema.
//!
//! One schema drives the SQL projection, the normalizer, and the index or
//! collection definition on every destination.

/// Dimensionality of the listing image embeddings.
pub const DEFAULT_EMBEDDING_DIMS: usize = 512;

/// Destination type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Exact-match strings: identifiers, codes, currencies.
    Keyword,
    /// Full-text strings.
    Text,
    /// Floating point numbers.
    Number,
    /// Dense vector of fixed dimensionality.
    Vector { dims: usize },
}

/// One field of a destination document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name, identical to the source column name.
    pub name: String,
    pub kind: FieldKind,
    /// Whether the destination accepts documents without this field.
    pub optional: bool,
}

impl FieldSpec {
    pub fn keyword(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Keyword,
            optional: false,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
            optional: false,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Number,
            optional: false,
        }
    }

    pub fn vector(name: impl Into<String>, dims: usize) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Vector { dims },
            optional: false,
        }
    }

    /// Mark the field as optional (builder style).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.kind, FieldKind::Vector { .. })
    }
}

/// Ordered set of fields a destination document carries.
///
/// The identifier field is implicit and always named `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSchema {
    pub fields: Vec<FieldSpec>,
}

impl DocumentSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Schema of the listings table and its image embeddings.
    ///
    /// The embedding is optional because listings are left-joined against the
    /// embeddings table and may not have one yet.
    pub fn listings(embedding_dims: usize) -> Self {
        Self::new(vec![
            FieldSpec::keyword("release_id"),
            FieldSpec::text("meta_text"),
            FieldSpec::keyword("barcode"),
            FieldSpec::keyword("data_source"),
            FieldSpec::keyword("source_id"),
            FieldSpec::number("price").optional(),
            FieldSpec::keyword("currency").optional(),
            FieldSpec::vector("front_image_embeddings", embedding_dims).optional(),
        ])
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Scalar (non-vector) fields, in schema order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.is_vector())
    }

    /// Vector fields, in schema order.
    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_vector())
    }

    /// Names of fields a document must carry before submission.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| !f.optional)
            .map(|f| f.name.as_str())
    }
}

impl Default for DocumentSchema {
    fn default() -> Self {
        Self::listings(DEFAULT_EMBEDDING_DIMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listings_schema_shape() {
        let schema = DocumentSchema::default();

        assert_eq!(schema.scalar_fields().count(), 7);
        let vectors: Vec<_> = schema.vector_fields().collect();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].kind, FieldKind::Vector { dims: 512 });
        assert!(vectors[0].optional);
    }

    #[test]
    fn test_required_fields_exclude_optional() {
        let schema = DocumentSchema::default();
        let required: Vec<_> = schema.required_fields().collect();

        assert!(required.contains(&"barcode"));
        assert!(!required.contains(&"price"));
        assert!(!required.contains(&"front_image_embeddings"));
    }
}
