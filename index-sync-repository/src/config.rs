//! Connection settings for the backends.
//!
//! These are plain values; building them from the environment is the
//! binary's job.

use std::path::PathBuf;
use std::time::Duration;

/// Connect and read timeouts shared by every backend.
///
/// Bulk requests can legitimately take much longer than a ping, so the two
/// are configured separately.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(30),
        }
    }
}

/// Postgres connection and table settings.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// libpq-style sslmode (`disable`, `prefer`, `require`, `verify-full`, ...).
    pub ssl_mode: String,
    /// Primary table holding the records.
    pub table: String,
    /// Auxiliary table holding precomputed embeddings.
    pub embeddings_table: String,
    /// Column of the embeddings table referencing the primary table's `id`.
    pub embeddings_foreign_key: String,
    /// Server-side statement timeout.
    pub statement_timeout: Duration,
    pub timeouts: Timeouts,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            ssl_mode: "prefer".to_string(),
            table: "listings".to_string(),
            embeddings_table: "listings_embeddings".to_string(),
            embeddings_foreign_key: "listings_id".to_string(),
            statement_timeout: Duration::from_secs(300),
            timeouts: Timeouts::default(),
        }
    }
}

/// OpenSearch connection settings.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// PEM bundle used to validate the server certificate.
    pub ca_cert_path: Option<PathBuf>,
    /// Time-to-live of scroll contexts, in OpenSearch time units (`2m`).
    pub scroll_ttl: String,
    pub timeouts: Timeouts,
}

impl OpenSearchConfig {
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index: index.into(),
            username: None,
            password: None,
            ca_cert_path: None,
            scroll_ttl: "2m".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Typesense connection settings.
#[derive(Debug, Clone)]
pub struct TypesenseConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub api_key: String,
    pub collection: String,
    pub timeouts: Timeouts,
}

impl TypesenseConfig {
    /// Base URL of the Typesense node.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}
