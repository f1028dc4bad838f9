//! Run configuration read from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use index_sync_pipeline::loader::IndexerConfig;
use index_sync_pipeline::{OrchestratorConfig, RetryPolicy};
use index_sync_repository::{OpenSearchConfig, PostgresConfig, Timeouts, TypesenseConfig};
use index_sync_shared::DEFAULT_EMBEDDING_DIMS;

use crate::SyncError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Which search backend a run writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Typesense,
    OpenSearch,
}

impl FromStr for DestinationKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typesense" => Ok(Self::Typesense),
            "opensearch" | "elasticsearch" => Ok(Self::OpenSearch),
            other => Err(SyncError::config(format!(
                "Unknown destination '{}', expected typesense or opensearch",
                other
            ))),
        }
    }
}

/// Backend-specific destination settings.
#[derive(Debug, Clone)]
pub enum DestinationConfig {
    Typesense(TypesenseConfig),
    OpenSearch(OpenSearchConfig),
}

/// Everything a run needs, read once at startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub postgres: PostgresConfig,
    pub destination: DestinationConfig,
    pub pipeline: OrchestratorConfig,
    pub embedding_dims: usize,
}

impl SyncConfig {
    /// Read the configuration from the process environment.
    ///
    /// `destination` overrides `SYNC_DESTINATION` when given.
    pub fn from_env(destination: Option<DestinationKind>) -> Result<Self, SyncError> {
        Self::from_lookup(|name| env::var(name).ok(), destination)
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        destination: Option<DestinationKind>,
    ) -> Result<Self, SyncError> {
        let vars = Vars(&lookup);

        let timeouts = Timeouts {
            connect: Duration::from_secs(vars.parse("CONNECT_TIMEOUT_SECS", 10)?),
            read: Duration::from_secs(vars.parse("READ_TIMEOUT_SECS", 30)?),
        };

        let defaults = PostgresConfig::default();
        let postgres = PostgresConfig {
            host: vars.string("PG_HOST", &defaults.host),
            port: vars.parse("PG_PORT", defaults.port)?,
            database: vars.string("PG_DATABASE", &defaults.database),
            user: vars.string("PG_USER", &defaults.user),
            password: vars.string("PG_PASSWORD", &defaults.password),
            ssl_mode: vars.string("PG_SSLMODE", &defaults.ssl_mode),
            table: vars.string("SOURCE_TABLE", &defaults.table),
            embeddings_table: vars.string("EMBEDDINGS_TABLE", &defaults.embeddings_table),
            embeddings_foreign_key: vars
                .string("EMBEDDINGS_FOREIGN_KEY", &defaults.embeddings_foreign_key),
            statement_timeout: Duration::from_secs(vars.parse("PG_STATEMENT_TIMEOUT_SECS", 300)?),
            timeouts,
        };

        let collection = vars
            .optional("SYNC_COLLECTION")
            .ok_or_else(|| SyncError::config("SYNC_COLLECTION is required"))?;

        let kind = match destination {
            Some(kind) => kind,
            None => vars
                .optional("SYNC_DESTINATION")
                .map_or(Ok(DestinationKind::Typesense), |v| v.parse())?,
        };

        let destination = match kind {
            DestinationKind::Typesense => DestinationConfig::Typesense(TypesenseConfig {
                protocol: vars.string("TYPESENSE_PROTOCOL", "http"),
                host: vars.string("TYPESENSE_HOST", "localhost"),
                port: vars.parse("TYPESENSE_PORT", 8108)?,
                api_key: vars.optional("TYPESENSE_API_KEY").ok_or_else(|| {
                    SyncError::config("TYPESENSE_API_KEY is required for the Typesense destination")
                })?,
                collection,
                timeouts,
            }),
            DestinationKind::OpenSearch => {
                let mut config = OpenSearchConfig::new(
                    vars.string("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
                    collection,
                );
                config.username = vars.optional("OPENSEARCH_USER");
                config.password = vars.optional("OPENSEARCH_PASSWORD");
                config.ca_cert_path = vars.optional("OPENSEARCH_CA_CERT").map(PathBuf::from);
                config.scroll_ttl = vars.string("OPENSEARCH_SCROLL_TTL", "2m");
                config.timeouts = timeouts;
                DestinationConfig::OpenSearch(config)
            }
        };

        let retry = RetryPolicy {
            max_attempts: vars.positive("RETRY_MAX_ATTEMPTS", 3)?,
            min_delay: Duration::from_millis(vars.parse("RETRY_MIN_DELAY_MS", 4000)?),
            max_delay: Duration::from_millis(vars.parse("RETRY_MAX_DELAY_MS", 10000)?),
            jitter: vars.parse("RETRY_JITTER", true)?,
        };
        if retry.min_delay > retry.max_delay {
            return Err(SyncError::config(
                "RETRY_MIN_DELAY_MS must not exceed RETRY_MAX_DELAY_MS",
            ));
        }

        let pipeline = OrchestratorConfig {
            source_batch_size: vars.positive("SOURCE_ENUM_BATCH_SIZE", 100_000)?,
            destination_batch_size: vars.positive("DESTINATION_ENUM_BATCH_SIZE", 1_000)?,
            fetch_batch_size: vars.positive("FETCH_BATCH_SIZE", 500)?,
            fetch_retry: retry.clone(),
            indexer: IndexerConfig {
                sub_batch_size: vars.positive("INDEX_BATCH_SIZE", 100)?,
                batch_delay: Duration::from_millis(vars.parse("INDEX_BATCH_DELAY_MS", 500)?),
                retry,
            },
            dry_run: false,
        };

        Ok(Self {
            postgres,
            destination,
            pipeline,
            embedding_dims: vars.positive("EMBEDDING_DIMS", DEFAULT_EMBEDDING_DIMS)?,
        })
    }

    pub fn destination_kind(&self) -> DestinationKind {
        match self.destination {
            DestinationConfig::Typesense(_) => DestinationKind::Typesense,
            DestinationConfig::OpenSearch(_) => DestinationKind::OpenSearch,
        }
    }
}

/// Typed access to configuration variables. Blank values read as unset.
struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, SyncError> {
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| SyncError::config(format!("{} has an invalid value '{}'", name, raw))),
        }
    }

    fn positive<T: FromStr + Default + PartialEq>(
        &self,
        name: &str,
        default: T,
    ) -> Result<T, SyncError> {
        let value = self.parse(name, default)?;
        if value == T::default() {
            return Err(SyncError::config(format!("{} must be greater than zero", name)));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::from_lookup(
            lookup(&[("SYNC_COLLECTION", "listings"), ("TYPESENSE_API_KEY", "xyz")]),
            None,
        )
        .unwrap();

        assert_eq!(config.destination_kind(), DestinationKind::Typesense);
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.postgres.table, "listings");
        assert_eq!(config.pipeline.source_batch_size, 100_000);
        assert_eq!(config.pipeline.destination_batch_size, 1_000);
        assert_eq!(config.pipeline.fetch_batch_size, 500);
        assert_eq!(config.pipeline.indexer.sub_batch_size, 100);
        assert_eq!(config.pipeline.indexer.retry.max_attempts, 3);
        assert_eq!(config.pipeline.indexer.retry.min_delay, Duration::from_secs(4));
        assert_eq!(config.embedding_dims, 512);

        let DestinationConfig::Typesense(ts) = config.destination else {
            panic!("expected typesense");
        };
        assert_eq!(ts.base_url(), "http://localhost:8108");
        assert_eq!(ts.collection, "listings");
    }

    #[test]
    fn test_opensearch_selection() {
        let config = SyncConfig::from_lookup(
            lookup(&[
                ("SYNC_COLLECTION", "listings"),
                ("SYNC_DESTINATION", "opensearch"),
                ("OPENSEARCH_USER", "admin"),
                ("OPENSEARCH_CA_CERT", "/etc/ssl/root-ca.pem"),
                ("READ_TIMEOUT_SECS", "120"),
            ]),
            None,
        )
        .unwrap();

        let DestinationConfig::OpenSearch(os) = config.destination else {
            panic!("expected opensearch");
        };
        assert_eq!(os.url, DEFAULT_OPENSEARCH_URL);
        assert_eq!(os.index, "listings");
        assert_eq!(os.username.as_deref(), Some("admin"));
        assert_eq!(os.ca_cert_path, Some(PathBuf::from("/etc/ssl/root-ca.pem")));
        assert_eq!(os.timeouts.read, Duration::from_secs(120));
    }

    #[test]
    fn test_flag_overrides_environment() {
        let config = SyncConfig::from_lookup(
            lookup(&[("SYNC_COLLECTION", "listings"), ("SYNC_DESTINATION", "typesense")]),
            Some(DestinationKind::OpenSearch),
        )
        .unwrap();

        assert_eq!(config.destination_kind(), DestinationKind::OpenSearch);
    }

    #[test]
    fn test_missing_required_values() {
        let no_collection = SyncConfig::from_lookup(lookup(&[("TYPESENSE_API_KEY", "xyz")]), None);
        assert!(matches!(no_collection, Err(SyncError::ConfigError(_))));

        let no_key = SyncConfig::from_lookup(lookup(&[("SYNC_COLLECTION", "listings")]), None);
        assert!(matches!(no_key, Err(SyncError::ConfigError(_))));
    }

    #[test]
    fn test_retry_settings() {
        let config = SyncConfig::from_lookup(
            lookup(&[
                ("SYNC_COLLECTION", "listings"),
                ("TYPESENSE_API_KEY", "xyz"),
                ("RETRY_MAX_ATTEMPTS", "4294967295"),
                ("RETRY_JITTER", "false"),
            ]),
            None,
        )
        .unwrap();

        assert_eq!(config.pipeline.fetch_retry.max_attempts, u32::MAX);
        assert!(!config.pipeline.indexer.retry.jitter);
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        for (name, value) in [
            ("PG_PORT", "five"),
            ("FETCH_BATCH_SIZE", "0"),
            ("RETRY_MAX_ATTEMPTS", "0"),
            ("RETRY_MAX_ATTEMPTS", "4294967297"),
            ("INDEX_BATCH_SIZE", "-1"),
            ("RETRY_JITTER", "sometimes"),
            ("SYNC_DESTINATION", "solr"),
        ] {
            let result = SyncConfig::from_lookup(
                lookup(&[
                    ("SYNC_COLLECTION", "listings"),
                    ("TYPESENSE_API_KEY", "xyz"),
                    (name, value),
                ]),
                None,
            );
            assert!(result.is_err(), "{}={} was accepted", name, value);
        }
    }
}
