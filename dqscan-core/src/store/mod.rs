//! Store adapter trait for relational data stores.
//!
//! Any store exposing table enumeration, column enumeration, and read
//! query execution is pluggable behind [`StoreAdapter`]. The bundled
//! implementation is SQLite (`sqlite` module); the trait is object-safe
//! so the pipeline can hold a `&dyn StoreAdapter`.

use crate::Result;
use crate::models::ColumnDescriptor;
use async_trait::async_trait;
use std::time::Duration;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Connection options for store adapters.
///
/// Read-only is the default: the pipeline never mutates the store. The
/// writable mode exists for CSV ingestion and test setup only.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Whether to open the store read-only
    pub read_only: bool,
    /// Connection acquisition timeout
    pub connect_timeout: Duration,
    /// Maximum pool size (SQLite wants exactly one)
    pub max_connections: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            read_only: true,
            connect_timeout: Duration::from_secs(30),
            max_connections: 1,
        }
    }
}

impl StoreOptions {
    /// Returns writable options for ingestion and tests.
    pub fn writable() -> Self {
        Self {
            read_only: false,
            ..Self::default()
        }
    }

    /// Validates option values.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(crate::error::DqScanError::configuration(
                "max_connections must be greater than 0",
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(crate::error::DqScanError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Object-safe interface to a relational store.
///
/// All operations are read-only; `run_query` executes exactly one
/// statement and returns rows as JSON objects preserving column order
/// and the store's native value typing.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Verifies the store is reachable and metadata is accessible.
    async fn test_connection(&self) -> Result<()>;

    /// Enumerates user tables in a stable order.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Enumerates a table's columns in declaration order.
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Runs a read query, returning one JSON object per row.
    ///
    /// # Errors
    /// Returns `QueryExecution` with the driver message on failure; the
    /// executor converts this into a failed `QueryResult` rather than
    /// aborting the run.
    async fn run_query(&self, sql: &str) -> Result<Vec<serde_json::Value>>;

    /// Releases the connection. Safe to call on every exit path.
    async fn close(&self);
}
