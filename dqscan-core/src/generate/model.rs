//! Model-assisted query generation.
//!
//! Delegates candidate production to a [`TextGenerator`] collaborator and
//! validates every returned query before acceptance: each candidate must
//! pass the read-only guard and may reference only tables and columns
//! present in the snapshot. Failing candidates become [`RejectedQuery`]
//! entries, logged as `GeneratedQueryRejected`, and are never executed.
//! The accepted and rejected lists always partition the raw output.

use super::textgen::{PromptContext, TextGenerator};
use super::{GenerationOutcome, GenerationStrategy};
use crate::Result;
use crate::execute::ensure_read_only;
use crate::models::{CheckKind, QueryCategory, QuerySpec, RejectedQuery, SchemaSnapshot};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// SQL keywords and functions that are not identifiers.
///
/// Unquoted words outside this list must name a table or column from the
/// snapshot (or a declared alias). The list is deliberately generous on
/// functions: a missing entry causes a false rejection, which fails
/// closed.
const SQL_VOCABULARY: &[&str] = &[
    "ABS", "ALL", "AND", "AS", "ASC", "AVG", "BETWEEN", "BY", "CASE", "CAST", "COALESCE",
    "COUNT", "CROSS", "DESC", "DISTINCT", "ELSE", "END", "ESCAPE", "EXCEPT", "EXISTS", "FROM",
    "FULL", "GLOB", "GROUP", "HAVING", "IFNULL", "IN", "INNER", "INSTR", "INTEGER", "INTERSECT",
    "IS", "JOIN", "LEFT", "LENGTH", "LIKE", "LIMIT", "LOWER", "LTRIM", "MAX", "MIN", "NATURAL",
    "NOT", "NULL", "NULLIF", "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER", "PARTITION",
    "REAL", "RIGHT", "ROUND", "ROW_NUMBER", "RTRIM", "SELECT", "SUBSTR", "SUM", "TEXT", "THEN",
    "TOTAL", "TRIM", "UNION", "UPPER", "USING", "WHEN", "WHERE", "WITH",
];

/// Strategy that asks an external text-generation service for queries.
pub struct ModelAssistedGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl ModelAssistedGenerator {
    /// Creates the strategy around a text-generation collaborator.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GenerationStrategy for ModelAssistedGenerator {
    fn name(&self) -> &'static str {
        "model-assisted"
    }

    async fn generate(&self, snapshot: &SchemaSnapshot) -> Result<GenerationOutcome> {
        let context = PromptContext::from_snapshot(snapshot);
        let raw = self.generator.generate_queries(&context).await?;
        let raw_count = raw.len();

        let mut specs = Vec::new();
        let mut rejected = Vec::new();

        for sql in raw {
            let sql = sql.trim().trim_end_matches(';').to_string();
            match validate_candidate(snapshot, &sql) {
                Ok(table) => {
                    specs.push(QuerySpec {
                        id: format!("generated.{:03}", specs.len() + 1),
                        category: classify(&sql),
                        kind: CheckKind::Generated,
                        table,
                        column: None,
                        sql,
                    });
                }
                Err(reason) => {
                    tracing::warn!("GeneratedQueryRejected: {} in '{}'", reason, sql);
                    rejected.push(RejectedQuery { sql, reason });
                }
            }
        }

        tracing::info!(
            "Model-assisted generation: {} raw, {} accepted, {} rejected",
            raw_count,
            specs.len(),
            rejected.len()
        );

        Ok(GenerationOutcome { specs, rejected })
    }
}

/// Validates one candidate query against the snapshot.
///
/// Returns the first snapshot table the query references (carried on the
/// spec), or a rejection reason.
fn validate_candidate(snapshot: &SchemaSnapshot, sql: &str) -> std::result::Result<String, String> {
    ensure_read_only(sql).map_err(|violation| format!("not a read query: {violation}"))?;

    let tokens = scan_identifier_tokens(sql);
    let aliases = collect_aliases(&tokens);

    let mut referenced_table: Option<String> = None;
    for token in &tokens {
        if !token.quoted {
            let upper = token.text.to_uppercase();
            if SQL_VOCABULARY.contains(&upper.as_str()) {
                continue;
            }
            if aliases.contains(&token.text.to_lowercase()) {
                continue;
            }
        }

        if let Some(table) = snapshot.table(&token.text) {
            referenced_table.get_or_insert_with(|| table.name.clone());
            continue;
        }
        if snapshot.has_column(&token.text) {
            continue;
        }
        return Err(format!("unknown identifier '{}'", token.text));
    }

    referenced_table.ok_or_else(|| "references no table from the snapshot".to_string())
}

/// Display grouping for generated queries.
///
/// The service emits profiling and data-quality queries in one batch;
/// defect-detection markers pick the Data Quality bucket.
fn classify(sql: &str) -> QueryCategory {
    let upper = sql.to_uppercase();
    if upper.contains("IS NULL") || upper.contains("HAVING") || upper.contains("NOT EXISTS") {
        QueryCategory::DataQuality
    } else {
        QueryCategory::Profiling
    }
}

struct IdentifierToken {
    text: String,
    /// Quoted identifiers bypass the keyword check; they are always
    /// names and must exist in the snapshot.
    quoted: bool,
}

/// Extracts word and quoted-identifier tokens, skipping comments and
/// string literals.
fn scan_identifier_tokens(sql: &str) -> Vec<IdentifierToken> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b'\'' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'\'' {
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
            }
            quote @ (b'"' | b'`') => {
                let start = i + 1;
                i = start;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                tokens.push(IdentifierToken {
                    text: sql[start..i.min(bytes.len())].to_string(),
                    quoted: true,
                });
                i = (i + 1).min(bytes.len());
            }
            b'[' => {
                let start = i + 1;
                i = start;
                while i < bytes.len() && bytes[i] != b']' {
                    i += 1;
                }
                tokens.push(IdentifierToken {
                    text: sql[start..i.min(bytes.len())].to_string(),
                    quoted: true,
                });
                i = (i + 1).min(bytes.len());
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(IdentifierToken {
                    text: sql[start..i].to_string(),
                    quoted: false,
                });
            }
            _ => i += 1,
        }
    }

    tokens
}

/// Names declared by the query itself: identifiers adjacent to AS cover
/// result aliases (`COUNT(*) AS total`), table aliases (`emp AS e`), and
/// CTE names (`ranked AS (...)`). Bare aliases without AS are not
/// recognized and cause a rejection, which fails closed.
fn collect_aliases(tokens: &[IdentifierToken]) -> HashSet<String> {
    let mut aliases = HashSet::new();
    for (idx, token) in tokens.iter().enumerate() {
        if token.quoted || !token.text.eq_ignore_ascii_case("as") {
            continue;
        }
        for neighbor in [idx.checked_sub(1), Some(idx + 1)].into_iter().flatten() {
            if let Some(t) = tokens.get(neighbor) {
                if t.quoted || !SQL_VOCABULARY.contains(&t.text.to_uppercase().as_str()) {
                    aliases.insert(t.text.to_lowercase());
                }
            }
        }
    }
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDescriptor, TableSchema};

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

    /// Collaborator returning a fixed candidate list.
    struct StubGenerator {
        queries: Vec<String>,
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate_queries(&self, _context: &PromptContext) -> Result<Vec<String>> {
            Ok(self.queries.clone())
        }
    }

    async fn run(queries: &[&str]) -> GenerationOutcome {
        let generator = ModelAssistedGenerator::new(Arc::new(StubGenerator {
            queries: queries.iter().map(|q| (*q).to_string()).collect(),
        }));
        generator.generate(&emp_snapshot()).await.unwrap()
    }

    #[tokio::test]
    async fn test_accepted_plus_rejected_equals_raw() {
        let outcome = run(&[
            "SELECT COUNT(*) FROM emp",
            "SELECT missing FROM emp",
            "SELECT name FROM nowhere",
            "DELETE FROM emp",
        ])
        .await;

        assert_eq!(outcome.specs.len() + outcome.rejected.len(), 4);
        assert_eq!(outcome.specs.len(), 1);
        assert_eq!(outcome.rejected.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_table_is_rejected() {
        let outcome = run(&["SELECT id FROM payroll"]).await;
        assert!(outcome.specs.is_empty());
        assert!(outcome.rejected[0].reason.contains("payroll"));
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected() {
        let outcome = run(&["SELECT salary FROM emp"]).await;
        assert!(outcome.specs.is_empty());
        assert!(outcome.rejected[0].reason.contains("salary"));
    }

    #[tokio::test]
    async fn test_write_is_rejected_with_reason() {
        let outcome = run(&["DROP TABLE emp"]).await;
        assert!(outcome.rejected[0].reason.contains("not a read query"));
    }

    #[tokio::test]
    async fn test_aliases_are_recognized() {
        let outcome = run(&[
            "SELECT COUNT(*) AS total FROM emp",
            "WITH ranked AS (SELECT id FROM emp) SELECT id FROM ranked",
            "SELECT e.name FROM emp AS e",
        ])
        .await;
        assert_eq!(outcome.specs.len(), 3, "rejected: {:?}", outcome.rejected);
    }

    #[tokio::test]
    async fn test_quoted_identifiers_are_validated() {
        let outcome = run(&[
            "SELECT \"name\" FROM \"emp\"",
            "SELECT \"ghost\" FROM \"emp\"",
        ])
        .await;
        assert_eq!(outcome.specs.len(), 1);
        assert!(outcome.rejected[0].reason.contains("ghost"));
    }

    #[tokio::test]
    async fn test_tableless_query_is_rejected() {
        let outcome = run(&["SELECT 1"]).await;
        assert!(outcome.rejected[0].reason.contains("no table"));
    }

    #[tokio::test]
    async fn test_mutating_words_in_literals_pass_validation() {
        let outcome = run(&["SELECT name FROM emp WHERE name LIKE 'drop%'"]).await;
        assert_eq!(outcome.specs.len(), 1);
    }

    #[tokio::test]
    async fn test_accepted_specs_are_generated_kind() {
        let outcome = run(&["SELECT COUNT(*) FROM emp WHERE name IS NULL"]).await;
        let spec = &outcome.specs[0];
        assert_eq!(spec.kind, CheckKind::Generated);
        assert_eq!(spec.category, QueryCategory::DataQuality);
        assert_eq!(spec.table, "emp");
        assert_eq!(spec.id, "generated.001");
    }

    #[test]
    fn test_classify_buckets() {
        assert_eq!(
            classify("SELECT AVG(id) FROM emp"),
            QueryCategory::Profiling
        );
        assert_eq!(
            classify("SELECT COUNT(*) FROM emp WHERE name IS NULL"),
            QueryCategory::DataQuality
        );
    }
}
