//! Rule-based query generation.
//!
//! Deterministic template emission: tables in snapshot order, columns in
//! declaration order, so `generate(S)` always yields the same sequence
//! for the same snapshot. Per table this emits:
//!
//! 1. per column: a combined row-count/null-count query (one scan
//!    covers both counts)
//! 2. one duplicate-row-detection query over all columns
//! 3. per text column: a distinct/unique-ratio summary with value
//!    length statistics
//! 4. per numeric column: min/max/mean/median
//! 5. per numeric column that is not key-like: an IQR outlier count
//!    (quartiles via ORDER BY/OFFSET; SQLite has no percentile function)
//! 6. per `<prefix>_id` column: a referential-integrity check against
//!    the inferred parent table

use super::{GenerationOutcome, GenerationStrategy};
use crate::Result;
use crate::models::{
    CheckKind, ColumnDescriptor, QueryCategory, QuerySpec, SchemaSnapshot, TableSchema,
};
use async_trait::async_trait;

/// Deterministic template-driven generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedGenerator;

#[async_trait]
impl GenerationStrategy for RuleBasedGenerator {
    fn name(&self) -> &'static str {
        "rule-based"
    }

    async fn generate(&self, snapshot: &SchemaSnapshot) -> Result<GenerationOutcome> {
        let mut specs = Vec::new();

        for table in &snapshot.tables {
            emit_for_table(snapshot, table, &mut specs);
        }

        tracing::info!(
            "Rule-based generation produced {} queries for {} tables",
            specs.len(),
            snapshot.tables.len()
        );

        Ok(GenerationOutcome {
            specs,
            rejected: Vec::new(),
        })
    }
}

fn emit_for_table(snapshot: &SchemaSnapshot, table: &TableSchema, specs: &mut Vec<QuerySpec>) {
    let t = quote_ident(&table.name);

    for column in &table.columns {
        let c = quote_ident(&column.name);
        specs.push(QuerySpec {
            id: format!("{}.null_count.{}", table.name, column.name),
            category: QueryCategory::DataQuality,
            kind: CheckKind::RowAndNullCount,
            table: table.name.clone(),
            column: Some(column.name.clone()),
            sql: format!(
                "SELECT COUNT(*) AS total_rows, \
                 SUM(CASE WHEN {c} IS NULL THEN 1 ELSE 0 END) AS null_count FROM {t}"
            ),
        });
    }

    let group_by: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect();
    let group_by = group_by.join(", ");
    specs.push(QuerySpec {
        id: format!("{}.duplicates", table.name),
        category: QueryCategory::DataQuality,
        kind: CheckKind::DuplicateRows,
        table: table.name.clone(),
        column: None,
        sql: format!(
            "SELECT COALESCE(SUM(n - 1), 0) AS duplicate_rows FROM \
             (SELECT COUNT(*) AS n FROM {t} GROUP BY {group_by} HAVING COUNT(*) > 1)"
        ),
    });

    for column in &table.columns {
        if !column.affinity.is_textual() {
            continue;
        }
        let c = quote_ident(&column.name);
        specs.push(QuerySpec {
            id: format!("{}.distinct.{}", table.name, column.name),
            category: QueryCategory::Profiling,
            kind: CheckKind::DistinctProfile,
            table: table.name.clone(),
            column: Some(column.name.clone()),
            sql: format!(
                "SELECT COUNT(DISTINCT {c}) AS distinct_values, \
                 CAST(COUNT(DISTINCT {c}) AS REAL) / NULLIF(COUNT({c}), 0) AS unique_ratio, \
                 MIN(LENGTH({c})) AS min_length, \
                 MAX(LENGTH({c})) AS max_length, \
                 AVG(LENGTH({c})) AS mean_length FROM {t}"
            ),
        });
    }

    for column in &table.columns {
        if !column.affinity.is_numeric() {
            continue;
        }
        let c = quote_ident(&column.name);
        specs.push(QuerySpec {
            id: format!("{}.stats.{}", table.name, column.name),
            category: QueryCategory::Profiling,
            kind: CheckKind::NumericStats,
            table: table.name.clone(),
            column: Some(column.name.clone()),
            sql: format!(
                "SELECT MIN({c}) AS min_value, MAX({c}) AS max_value, \
                 AVG({c}) AS mean_value, \
                 (SELECT {c} FROM {t} WHERE {c} IS NOT NULL ORDER BY {c} \
                 LIMIT 1 OFFSET (SELECT (COUNT({c}) - 1) / 2 FROM {t})) AS median_value \
                 FROM {t}"
            ),
        });
    }

    for column in &table.columns {
        if !column.affinity.is_numeric() || is_key_like(&column.name) {
            continue;
        }
        let c = quote_ident(&column.name);
        specs.push(QuerySpec {
            id: format!("{}.outliers.{}", table.name, column.name),
            category: QueryCategory::DataQuality,
            kind: CheckKind::OutlierScan,
            table: table.name.clone(),
            column: Some(column.name.clone()),
            sql: format!(
                "WITH ordered AS (SELECT {c} AS v FROM {t} WHERE {c} IS NOT NULL ORDER BY v), \
                 bounds AS (SELECT \
                 (SELECT v FROM ordered LIMIT 1 OFFSET (SELECT (COUNT(*) - 1) / 4 FROM ordered)) AS q1, \
                 (SELECT v FROM ordered LIMIT 1 OFFSET (SELECT ((COUNT(*) - 1) * 3) / 4 FROM ordered)) AS q3) \
                 SELECT COUNT(*) AS outlier_count FROM {t}, bounds \
                 WHERE {t}.{c} < bounds.q1 - 1.5 * (bounds.q3 - bounds.q1) \
                 OR {t}.{c} > bounds.q3 + 1.5 * (bounds.q3 - bounds.q1)"
            ),
        });
    }

    for column in &table.columns {
        let (parent_table, parent_column) = match infer_reference(snapshot, table, column) {
            Some(target) => target,
            None => continue,
        };
        let c = quote_ident(&column.name);
        let p = quote_ident(&parent_table);
        let pc = quote_ident(&parent_column);
        specs.push(QuerySpec {
            id: format!("{}.ref.{}", table.name, column.name),
            category: QueryCategory::DataQuality,
            kind: CheckKind::ReferentialIntegrity,
            table: table.name.clone(),
            column: Some(column.name.clone()),
            sql: format!(
                "SELECT COUNT(*) AS violations FROM {t} AS child \
                 WHERE child.{c} IS NOT NULL \
                 AND NOT EXISTS (SELECT 1 FROM {p} AS parent WHERE parent.{pc} = child.{c})"
            ),
        });
    }
}

/// Identifier-shaped columns (`id`, `*_id`) whose value distribution is
/// uniform by construction; outlier scans skip them.
fn is_key_like(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "id" || lower.ends_with("_id")
}

/// Infers the parent of a foreign-key-named column.
///
/// `<prefix>_id` resolves to a table named `<prefix>` or `<prefix>s`
/// carrying an `id` column; otherwise, when the owning table itself has
/// an `id` column, the check falls back to a self-reference (manager
/// hierarchies and the like). Unresolvable prefixes emit nothing.
fn infer_reference(
    snapshot: &SchemaSnapshot,
    table: &TableSchema,
    column: &ColumnDescriptor,
) -> Option<(String, String)> {
    let lower = column.name.to_lowercase();
    if lower == "id" {
        return None;
    }
    let prefix = lower.strip_suffix("_id")?;

    for candidate in [prefix.to_string(), format!("{prefix}s")] {
        if let Some(parent) = snapshot.table(&candidate) {
            if let Some(id_column) = parent.column("id") {
                return Some((parent.name.clone(), id_column.name.clone()));
            }
        }
    }

    match table.column("id") {
        Some(id_column) if !id_column.name.eq_ignore_ascii_case(&column.name) => {
            Some((table.name.clone(), id_column.name.clone()))
        }
        _ => None,
    }
}

/// Quotes an identifier for SQLite (double quotes, doubled to escape).
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnDescriptor;

    fn emp_snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(vec![TableSchema {
            name: "emp".to_string(),
            columns: vec![
                ColumnDescriptor::new("id", "INTEGER", 0),
                ColumnDescriptor::new("name", "TEXT", 1),
                ColumnDescriptor::new("mgr_id", "INTEGER", 2),
            ],
        }])
    }

    async fn generate(snapshot: &SchemaSnapshot) -> Vec<QuerySpec> {
        RuleBasedGenerator
            .generate(snapshot)
            .await
            .unwrap()
            .specs
    }

    #[tokio::test]
    async fn test_generation_is_deterministic() {
        let snapshot = emp_snapshot();
        assert_eq!(generate(&snapshot).await, generate(&snapshot).await);
    }

    #[tokio::test]
    async fn test_emp_scenario_emits_eight_specs() {
        let specs = generate(&emp_snapshot()).await;

        let of_kind = |kind: CheckKind| specs.iter().filter(|s| s.kind == kind).count();
        assert_eq!(of_kind(CheckKind::RowAndNullCount), 3);
        assert_eq!(of_kind(CheckKind::DuplicateRows), 1);
        assert_eq!(of_kind(CheckKind::DistinctProfile), 1);
        assert_eq!(of_kind(CheckKind::NumericStats), 2);
        assert_eq!(of_kind(CheckKind::OutlierScan), 0);
        assert_eq!(of_kind(CheckKind::ReferentialIntegrity), 1);
        assert_eq!(specs.len(), 8);

        // The referential check resolves mgr_id to emp.id
        let reference = specs
            .iter()
            .find(|s| s.kind == CheckKind::ReferentialIntegrity)
            .unwrap();
        assert_eq!(reference.id, "emp.ref.mgr_id");
        assert!(reference.sql.contains("\"emp\""));
        assert!(reference.sql.contains("\"id\""));
    }

    #[tokio::test]
    async fn test_spec_ids_are_unique() {
        let specs = generate(&emp_snapshot()).await;
        let mut ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), specs.len());
    }

    #[tokio::test]
    async fn test_outlier_scan_for_measure_columns() {
        let snapshot = SchemaSnapshot::new(vec![TableSchema {
            name: "readings".to_string(),
            columns: vec![
                ColumnDescriptor::new("id", "INTEGER", 0),
                ColumnDescriptor::new("value", "REAL", 1),
            ],
        }]);

        let specs = generate(&snapshot).await;
        let outliers: Vec<&QuerySpec> = specs
            .iter()
            .filter(|s| s.kind == CheckKind::OutlierScan)
            .collect();
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].column.as_deref(), Some("value"));
        assert!(outliers[0].sql.contains("1.5"));
    }

    #[tokio::test]
    async fn test_reference_resolves_plural_parent() {
        let snapshot = SchemaSnapshot::new(vec![
            TableSchema {
                name: "customers".to_string(),
                columns: vec![ColumnDescriptor::new("id", "INTEGER", 0)],
            },
            TableSchema {
                name: "orders".to_string(),
                columns: vec![
                    ColumnDescriptor::new("id", "INTEGER", 0),
                    ColumnDescriptor::new("customer_id", "INTEGER", 1),
                ],
            },
        ]);

        let specs = generate(&snapshot).await;
        let reference = specs
            .iter()
            .find(|s| s.id == "orders.ref.customer_id")
            .unwrap();
        assert!(reference.sql.contains("\"customers\""));
    }

    #[tokio::test]
    async fn test_unresolvable_prefix_without_id_emits_nothing() {
        // No parent table, and the owning table has no id column either.
        let snapshot = SchemaSnapshot::new(vec![TableSchema {
            name: "events".to_string(),
            columns: vec![
                ColumnDescriptor::new("session_id", "INTEGER", 0),
                ColumnDescriptor::new("payload", "TEXT", 1),
            ],
        }]);

        let specs = generate(&snapshot).await;
        assert!(
            !specs
                .iter()
                .any(|s| s.kind == CheckKind::ReferentialIntegrity)
        );
    }

    #[tokio::test]
    async fn test_generated_sql_passes_read_only_guard() {
        let specs = generate(&emp_snapshot()).await;
        for spec in &specs {
            assert!(
                crate::execute::ensure_read_only(&spec.sql).is_ok(),
                "spec '{}' failed the read-only guard",
                spec.id
            );
        }
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
