//! Schema inspection stage.
//!
//! Captures an immutable [`SchemaSnapshot`] from the store: user tables
//! in enumeration order, columns in declaration order. Read-only and
//! idempotent; inspecting twice yields snapshots that differ only in the
//! capture timestamp.

use crate::Result;
use crate::error::DqScanError;
use crate::models::{SchemaSnapshot, TableSchema};
use crate::store::StoreAdapter;

/// Schema inspection entry point.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaInspector;

impl SchemaInspector {
    /// Captures a snapshot of all user tables and their columns.
    ///
    /// # Errors
    /// Returns `SchemaUnavailable` when the store cannot be reached or a
    /// table reports no columns (malformed metadata).
    pub async fn inspect(&self, store: &dyn StoreAdapter) -> Result<SchemaSnapshot> {
        let tables = store.list_tables().await?;
        tracing::debug!("Enumerated {} user tables", tables.len());

        let mut collected = Vec::with_capacity(tables.len());
        for table in &tables {
            let columns = store.list_columns(table).await?;
            if columns.is_empty() {
                return Err(DqScanError::schema_malformed(format!(
                    "Malformed metadata: table '{}' reports no columns",
                    table
                )));
            }
            tracing::debug!("Table '{}' has {} columns", table, columns.len());
            collected.push(TableSchema {
                name: table.clone(),
                columns,
            });
        }

        let snapshot = SchemaSnapshot::new(collected);
        tracing::info!(
            "Captured schema snapshot: {} tables",
            snapshot.tables.len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnDescriptor;
    use async_trait::async_trait;

    /// In-memory fake store describing a fixed schema.
    struct FakeStore {
        tables: Vec<(String, Vec<ColumnDescriptor>)>,
    }

    #[async_trait]
    impl StoreAdapter for FakeStore {
        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }

        async fn list_tables(&self) -> Result<Vec<String>> {
            Ok(self.tables.iter().map(|(n, _)| n.clone()).collect())
        }

        async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
            Ok(self
                .tables
                .iter()
                .find(|(n, _)| n == table)
                .map(|(_, c)| c.clone())
                .unwrap_or_default())
        }

        async fn run_query(&self, _sql: &str) -> Result<Vec<serde_json::Value>> {
            Ok(Vec::new())
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_inspect_preserves_order() {
        let store = FakeStore {
            tables: vec![(
                "emp".to_string(),
                vec![
                    ColumnDescriptor::new("id", "INTEGER", 0),
                    ColumnDescriptor::new("name", "TEXT", 1),
                    ColumnDescriptor::new("mgr_id", "INTEGER", 2),
                ],
            )],
        };

        let snapshot = SchemaInspector.inspect(&store).await.unwrap();
        assert_eq!(snapshot.tables.len(), 1);
        let names: Vec<&str> = snapshot.tables[0]
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "name", "mgr_id"]);
    }

    #[tokio::test]
    async fn test_inspect_rejects_columnless_table() {
        let store = FakeStore {
            tables: vec![("ghost".to_string(), vec![])],
        };

        let err = SchemaInspector.inspect(&store).await.unwrap_err();
        assert!(matches!(err, DqScanError::SchemaUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_inspect_empty_store_is_valid() {
        let store = FakeStore { tables: vec![] };
        let snapshot = SchemaInspector.inspect(&store).await.unwrap();
        assert!(snapshot.is_empty());
    }
}
