//! SQLite store adapter.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/data.db`, `./relative.db`
//! - In-memory: `sqlite::memory:` or `:memory:`
//!
//! Opens read-only by default with a single-connection pool; SQLite
//! needs no pooling and an in-memory database must not be spread over
//! multiple connections.

use super::{StoreAdapter, StoreOptions};
use crate::Result;
use crate::error::DqScanError;
use crate::models::ColumnDescriptor;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::str::FromStr;

/// SQLite-backed [`StoreAdapter`].
pub struct SqliteStore {
    /// Connection pool (single connection; public for test setup)
    pub pool: SqlitePool,
    options: StoreOptions,
    connection_string: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("options", &self.options)
            .field("in_memory", &self.is_in_memory())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens a read-only store from a connection string.
    ///
    /// # Errors
    /// Returns `Configuration` for an invalid connection string and
    /// `SchemaUnavailable` when the database cannot be opened.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        Self::connect_with(connection_string, StoreOptions::default()).await
    }

    /// Opens a store with explicit options (writable mode for ingestion
    /// and test setup).
    pub async fn connect_with(connection_string: &str, options: StoreOptions) -> Result<Self> {
        options.validate()?;
        validate_connection_string(connection_string)?;

        let normalized = normalize_connection_string(connection_string);
        let connect_options = SqliteConnectOptions::from_str(&normalized)
            .map_err(|e| {
                DqScanError::configuration(format!("Invalid SQLite connection string: {}", e))
            })?
            .read_only(options.read_only)
            .create_if_missing(!options.read_only);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections.max(1))
            .acquire_timeout(options.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| DqScanError::schema_unavailable("Failed to open SQLite database", e))?;

        Ok(Self {
            pool,
            options,
            connection_string: connection_string.to_string(),
        })
    }

    /// True when the connection points at an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.connection_string.contains(":memory:")
            || self.connection_string.contains("mode=memory")
    }
}

#[async_trait]
impl StoreAdapter for SqliteStore {
    async fn test_connection(&self) -> Result<()> {
        let probe: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DqScanError::schema_unavailable("Store connectivity check failed", e))?;

        if probe != 1 {
            return Err(DqScanError::configuration(
                "Connectivity check returned unexpected result",
            ));
        }

        // Schema enumeration requires sqlite_master access
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DqScanError::schema_unavailable("Cannot access sqlite_master", e))?;

        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DqScanError::schema_unavailable("Failed to enumerate tables", e))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| DqScanError::schema_unavailable("Failed to parse table name", e))?;
            tables.push(name);
        }

        Ok(tables)
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let pragma = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));

        let rows = sqlx::query(&pragma).fetch_all(&self.pool).await.map_err(|e| {
            DqScanError::schema_unavailable(
                format!("Failed to read columns for table '{}'", table),
                e,
            )
        })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let cid: i32 = row.try_get("cid").unwrap_or(0);
            let name: String = row.try_get("name").unwrap_or_default();
            let declared_type: String = row.try_get("type").unwrap_or_default();
            columns.push(ColumnDescriptor::new(name, declared_type, cid as u32));
        }

        Ok(columns)
    }

    async fn run_query(&self, sql: &str) -> Result<Vec<JsonValue>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DqScanError::query_failed(e.to_string()))?;

        Ok(rows.iter().map(row_to_object).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Validates a SQLite connection string.
pub fn validate_connection_string(connection_string: &str) -> Result<()> {
    if connection_string == ":memory:" || connection_string.starts_with("sqlite:") {
        return Ok(());
    }

    // Bare file paths are accepted for any common SQLite extension,
    // matching what the CLI hands through from --db-path.
    let looks_like_path = connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
        || connection_string.contains('/');

    if looks_like_path && !connection_string.contains("://") {
        return Ok(());
    }

    Err(DqScanError::configuration(
        "Invalid SQLite connection string: expected sqlite:// URL, file path, or :memory:",
    ))
}

/// Normalizes a connection string to the sqlite:// URL form sqlx expects.
pub fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }
    format!("sqlite://{}", connection_string)
}

/// Converts a row to a JSON object keyed by column name, in column order.
///
/// The branch is driven by the value's runtime type, not the column's
/// declared type: SQLite is dynamically typed and expression columns
/// (aggregates, CASE arms) carry no declared type at all.
fn row_to_object(row: &SqliteRow) -> JsonValue {
    let mut object = serde_json::Map::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), decode_value(row, idx));
    }

    JsonValue::Object(object)
}

fn decode_value(row: &SqliteRow, idx: usize) -> JsonValue {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) => raw,
        Err(_) => return JsonValue::Null,
    };
    if raw.is_null() {
        return JsonValue::Null;
    }

    match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(idx)
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null),
        "REAL" => row
            .try_get::<f64, _>(idx)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|bytes| {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                JsonValue::String(format!("base64:{}", encoded))
            })
            .unwrap_or(JsonValue::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
    }
}
