//! SurrealDB connection for the ledger.
//!
//! Provides connection management, schema setup and health checks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{LedgerResult, from_surrealdb_error};

/// Embedded RocksDB path used when no `[store].url` is configured.
const DEFAULT_DB_PATH: &str = "clanwatch.db";

fn default_url() -> String {
    format!("rocksdb://{DEFAULT_DB_PATH}")
}

fn default_namespace() -> String {
    "clanwatch".to_string()
}

fn default_database() -> String {
    "ledger".to_string()
}

/// Configuration for the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URL, e.g. `rocksdb://data/ledger`, `ws://localhost:8000`
    /// or `mem://` for a throwaway ledger
    #[serde(default = "default_url")]
    pub url: String,
    /// Namespace to use
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Database to use
    #[serde(default = "default_database")]
    pub database: String,
    /// Optional root credentials (`[store.credentials]`)
    #[serde(default, skip_serializing)]
    pub credentials: Option<Credentials>,
}

/// Root credentials for authentication.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl StoreConfig {
    /// Throwaway in-process ledger, for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            url: "mem://".to_string(),
            namespace: default_namespace(),
            database: "test".to_string(),
            credentials: None,
        }
    }

    /// Embedded RocksDB ledger stored at `path`.
    #[must_use]
    pub fn rocksdb(path: &str) -> Self {
        Self {
            url: format!("rocksdb://{path}"),
            namespace: default_namespace(),
            database: default_database(),
            credentials: None,
        }
    }

    /// Set credentials for authentication.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::rocksdb(DEFAULT_DB_PATH)
    }
}

/// SurrealDB-backed ledger.
///
/// Implements [`LedgerStore`](crate::LedgerStore); see [`crate::surreal`] for
/// the cycle implementation.
#[derive(Debug, Clone)]
pub struct SurrealLedger {
    pub(crate) db: Arc<Surreal<Any>>,
    pub(crate) cycle_lock: Arc<Mutex<()>>,
    config: StoreConfig,
}

impl SurrealLedger {
    /// Connect to the database with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or authentication fails.
    pub async fn connect(config: StoreConfig) -> LedgerResult<Self> {
        let db = Surreal::<Any>::init();

        db.connect(&config.url)
            .await
            .map_err(from_surrealdb_error)?;

        if let Some(creds) = &config.credentials {
            db.signin(Root {
                username: &creds.username,
                password: &creds.password,
            })
            .await
            .map_err(from_surrealdb_error)?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(from_surrealdb_error)?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connected to ledger"
        );

        Ok(Self {
            db: Arc::new(db),
            cycle_lock: Arc::new(Mutex::new(())),
            config,
        })
    }

    /// Connect and initialize the schema in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting or schema initialization fails.
    pub async fn open(config: StoreConfig) -> LedgerResult<Self> {
        let ledger = Self::connect(config).await?;
        ledger.initialize_schema().await?;
        Ok(ledger)
    }

    /// Get the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Initialize the database schema. Safe to run on every start.
    ///
    /// # Errors
    ///
    /// Returns an error if schema initialization fails.
    pub async fn initialize_schema(&self) -> LedgerResult<()> {
        let schema = include_str!("schema.surql");

        self.db
            .query(schema)
            .await
            .map_err(from_surrealdb_error)?
            .check()
            .map_err(from_surrealdb_error)?;

        debug!("Ledger schema initialized");
        Ok(())
    }

    /// Check if the database is healthy.
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails.
    pub async fn health_check(&self) -> LedgerResult<()> {
        self.db
            .query("INFO FOR DB")
            .await
            .map_err(from_surrealdb_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_store_config_in_memory() {
        let config = StoreConfig::in_memory();
        assert_eq!(config.url, "mem://");
        assert_eq!(config.namespace, "clanwatch");
        assert_eq!(config.database, "test");
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_default_store_is_durable() {
        let config = StoreConfig::default();
        assert_eq!(config.url, "rocksdb://clanwatch.db");
        assert_eq!(config.database, "ledger");
        assert_eq!(config, StoreConfig::rocksdb(DEFAULT_DB_PATH));
    }

    #[test]
    fn test_store_config_builders() {
        let config =
            StoreConfig::rocksdb("/var/lib/clanwatch").with_credentials("root", "hunter2");

        assert_eq!(config.url, "rocksdb:///var/lib/clanwatch");
        assert_eq!(config.namespace, "clanwatch");
        assert_eq!(config.database, "ledger");
        assert_eq!(
            config.credentials.map(|c| c.username),
            Some("root".to_string())
        );
    }

    #[test]
    fn test_store_config_deserializes_with_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"url": "ws://db:8000"}"#).unwrap();
        assert_eq!(config.url, "ws://db:8000");
        assert_eq!(config.namespace, "clanwatch");
        assert_eq!(config.database, "ledger");
        assert!(config.credentials.is_none());

        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.url, "rocksdb://clanwatch.db");

        let config: StoreConfig = serde_json::from_str(
            r#"{"url": "ws://db:8000", "credentials": {"username": "root", "password": "root"}}"#,
        )
        .unwrap();
        assert_eq!(config.credentials.map(|c| c.password), Some("root".to_string()));
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        let ledger = SurrealLedger::open(StoreConfig::in_memory()).await.unwrap();
        ledger.health_check().await.unwrap();
        // Schema setup is repeatable.
        ledger.initialize_schema().await.unwrap();
    }
}
