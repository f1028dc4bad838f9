//! SQL builders for the Postgres source.
//!
//! Table and column names come from configuration and the document schema,
//! so every identifier is quoted. Values are always bound, never inlined.

use index_sync_shared::DocumentSchema;

/// Name of the server-side cursor used for identifier enumeration.
pub(crate) const ID_CURSOR: &str = "index_sync_ids";

/// Quote a possibly schema-qualified identifier (`public.listings`).
pub(crate) fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

pub(crate) fn count_query(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_ident(table))
}

/// Resolve the SQL type of the primary table's `id` column.
///
/// Binds: `$1` table name (regclass text).
pub(crate) fn id_type_query() -> &'static str {
    "SELECT format_type(a.atttypid, a.atttypmod) \
     FROM pg_attribute a \
     WHERE a.attrelid = $1::regclass AND a.attname = 'id' AND NOT a.attisdropped"
}

/// Open a read-only snapshot and declare the identifier cursor in it.
pub(crate) fn declare_cursor(table: &str) -> String {
    format!(
        "BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY; \
         DECLARE {} NO SCROLL CURSOR FOR SELECT id::text FROM {}",
        ID_CURSOR,
        quote_ident(table)
    )
}

pub(crate) fn fetch_forward(batch_size: usize) -> String {
    format!("FETCH FORWARD {} FROM {}", batch_size, ID_CURSOR)
}

/// Ends the cursor transaction. Rolling back a read-only transaction also
/// closes every cursor declared in it.
pub(crate) const END_CURSOR: &str = "ROLLBACK";

/// Fetch full rows for a batch of identifiers, left-joined to embeddings.
///
/// Scalar columns are rendered as text and vector columns as JSON so the
/// normalizer sees the raw shape. Binds: `$1` identifiers as `text[]`.
pub(crate) fn fetch_records_query(
    table: &str,
    embeddings_table: &str,
    embeddings_foreign_key: &str,
    id_type: &str,
    schema: &DocumentSchema,
) -> String {
    let mut columns = vec!["l.id::text AS id".to_string()];
    for field in schema.scalar_fields() {
        let name = quote_ident(&field.name);
        columns.push(format!("l.{}::text AS {}", name, name));
    }
    for field in schema.vector_fields() {
        let name = quote_ident(&field.name);
        columns.push(format!("to_jsonb(e.{}) AS {}", name, name));
    }

    format!(
        "SELECT {} FROM {} l LEFT JOIN {} e ON e.{} = l.id WHERE l.id = ANY($1::text[]::{}[])",
        columns.join(", "),
        quote_ident(table),
        quote_ident(embeddings_table),
        quote_ident(embeddings_foreign_key),
        id_type
    )
}
