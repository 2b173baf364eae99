//! One-time CSV ingestion into the SQLite store.
//!
//! Drop-and-replace semantics: an existing table with the target name is
//! removed before the load. Column names come from the header row, types
//! are inferred from the data (INTEGER when every value parses as an
//! integer, REAL when every value parses as a number, TEXT otherwise),
//! and empty fields are stored as NULL so the null-count checks have
//! something honest to measure. All inserts run in one transaction.

use dqscan_core::error::DqScanError;
use dqscan_core::store::SqliteStore;
use dqscan_core::Result;
use std::path::Path;

/// What a CSV load produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLoadSummary {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Loads a CSV file into a table, replacing any existing table of the
/// same name. The store must be opened writable.
pub async fn load_csv(store: &SqliteStore, csv_path: &Path, table: &str) -> Result<CsvLoadSummary> {
    let mut reader = csv::Reader::from_path(csv_path).map_err(|e| DqScanError::Io {
        context: format!("Failed to open CSV file {}", csv_path.display()),
        source: std::io::Error::other(e),
    })?;

    let headers = reader
        .headers()
        .map_err(|e| DqScanError::Io {
            context: format!("Failed to read CSV header from {}", csv_path.display()),
            source: std::io::Error::other(e),
        })?
        .clone();

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| sanitize_column_name(h, idx))
        .collect();
    if columns.is_empty() {
        return Err(DqScanError::configuration("CSV file has no header row"));
    }
    ensure_unique(&columns)?;

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record.map_err(|e| DqScanError::Io {
            context: format!("Failed to read CSV record from {}", csv_path.display()),
            source: std::io::Error::other(e),
        })?);
    }

    let types = infer_column_types(&columns, &records);
    tracing::info!(
        "Loading {} rows into '{}' ({} columns)",
        records.len(),
        table,
        columns.len()
    );

    let mut tx = store
        .pool
        .begin()
        .await
        .map_err(|e| DqScanError::query_failed(format!("Failed to begin transaction: {e}")))?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
        .execute(&mut *tx)
        .await
        .map_err(|e| DqScanError::query_failed(format!("Failed to drop existing table: {e}")))?;

    let column_defs: Vec<String> = columns
        .iter()
        .zip(&types)
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty))
        .collect();
    let create = format!(
        "CREATE TABLE {} ({})",
        quote_ident(table),
        column_defs.join(", ")
    );
    sqlx::query(&create)
        .execute(&mut *tx)
        .await
        .map_err(|e| DqScanError::query_failed(format!("Failed to create table: {e}")))?;

    let placeholders = vec!["?"; columns.len()].join(", ");
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        quoted.join(", "),
        placeholders
    );

    for record in &records {
        let mut query = sqlx::query(&insert);
        for idx in 0..columns.len() {
            // Values bind as text; the column's declared affinity
            // coerces numerics on storage. Empty fields become NULL.
            let field = record.get(idx).unwrap_or_default();
            query = query.bind(if field.is_empty() {
                None
            } else {
                Some(field.to_string())
            });
        }
        query
            .execute(&mut *tx)
            .await
            .map_err(|e| DqScanError::query_failed(format!("Failed to insert row: {e}")))?;
    }

    tx.commit()
        .await
        .map_err(|e| DqScanError::query_failed(format!("Failed to commit CSV load: {e}")))?;

    Ok(CsvLoadSummary {
        table: table.to_string(),
        columns,
        rows: records.len(),
    })
}

/// Makes a header usable as a SQL column name: trimmed, whitespace
/// collapsed to underscores, empty headers replaced positionally.
fn sanitize_column_name(header: &str, idx: usize) -> String {
    let cleaned: String = header
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        format!("column_{}", idx + 1)
    } else {
        cleaned
    }
}

fn ensure_unique(columns: &[String]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for column in columns {
        if !seen.insert(column.to_lowercase()) {
            return Err(DqScanError::configuration(format!(
                "Duplicate CSV column name '{column}'"
            )));
        }
    }
    Ok(())
}

/// Infers a declared type per column from the non-empty values.
fn infer_column_types(columns: &[String], records: &[csv::StringRecord]) -> Vec<&'static str> {
    (0..columns.len())
        .map(|idx| {
            let mut saw_value = false;
            let mut integer = true;
            let mut real = true;
            for record in records {
                let field = record.get(idx).unwrap_or_default().trim();
                if field.is_empty() {
                    continue;
                }
                saw_value = true;
                if integer && field.parse::<i64>().is_err() {
                    integer = false;
                }
                if real && field.parse::<f64>().is_err() {
                    real = false;
                }
                if !real {
                    break;
                }
            }
            match (saw_value, integer, real) {
                (false, _, _) => "TEXT",
                (true, true, _) => "INTEGER",
                (true, false, true) => "REAL",
                (true, false, false) => "TEXT",
            }
        })
        .collect()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
