//! Query execution stage.
//!
//! Runs each spec independently and in order: one `QueryResult` per
//! `QuerySpec`, failures captured as data so one bad query never blocks
//! the rest of the profiling pass.
//!
//! # Safety Boundary
//! Generated SQL is untrusted text. Before any statement reaches the
//! store it must pass the read-only guard: a single statement, starting
//! with SELECT or WITH, with no mutating keyword anywhere outside string
//! literals and quoted identifiers. Violations fail closed with
//! `WriteQueryRejected` and the store is never contacted.

use crate::models::{FailureReason, QueryResult, QuerySpec};
use crate::store::StoreAdapter;
use std::time::Duration;

/// Keywords that disqualify a statement from read-only execution.
///
/// PRAGMA is included even though some PRAGMAs are reads: generated
/// queries have no business issuing them, and schema introspection goes
/// through the trusted store path instead.
const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "REPLACE", "TRUNCATE", "ATTACH",
    "DETACH", "VACUUM", "REINDEX", "PRAGMA",
];

/// Executor configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Per-query time budget; exceeding it fails the query with
    /// `Timeout` and moves on to the next spec.
    pub query_timeout: Option<Duration>,
}

/// Runs query specs against a store, isolating per-query failures.
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    config: ExecutorConfig,
}

impl QueryExecutor {
    /// Creates an executor with the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Executes all specs sequentially.
    ///
    /// Returns exactly `specs.len()` results in input order, regardless
    /// of individual failures.
    pub async fn execute(
        &self,
        store: &dyn StoreAdapter,
        specs: &[QuerySpec],
    ) -> Vec<QueryResult> {
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            results.push(self.execute_one(store, spec).await);
        }

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        tracing::info!(
            "Executed {} queries ({} ok, {} failed)",
            results.len(),
            results.len() - failed,
            failed
        );

        results
    }

    async fn execute_one(&self, store: &dyn StoreAdapter, spec: &QuerySpec) -> QueryResult {
        if let Err(violation) = ensure_read_only(&spec.sql) {
            tracing::warn!("Rejected query '{}': {}", spec.id, violation);
            return QueryResult::failed(&spec.id, FailureReason::WriteQueryRejected, violation);
        }

        tracing::debug!("Running query '{}'", spec.id);

        let run = store.run_query(&spec.sql);
        let outcome = match self.config.query_timeout {
            Some(budget) => match tokio::time::timeout(budget, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!("Query '{}' exceeded {:?} budget", spec.id, budget);
                    return QueryResult::failed(
                        &spec.id,
                        FailureReason::Timeout,
                        format!("query exceeded the {}ms budget", budget.as_millis()),
                    );
                }
            },
            None => run.await,
        };

        match outcome {
            Ok(rows) => QueryResult::ok(&spec.id, rows),
            Err(e) => {
                tracing::warn!("Query '{}' failed: {}", spec.id, e);
                QueryResult::failed(&spec.id, FailureReason::ExecutionFailed, e.to_string())
            }
        }
    }
}

/// Checks that a statement is a single read query.
///
/// # Errors
/// Returns a human-readable violation message; the executor stores it on
/// the failed result and the model-assisted generator uses it to reject
/// candidates before they are ever scheduled.
pub fn ensure_read_only(sql: &str) -> std::result::Result<(), String> {
    let tokens = significant_tokens(sql)?;

    let mut words = tokens.iter().filter(|t| *t != ";");
    let head = match words.next() {
        Some(head) => head,
        None => return Err("empty statement".to_string()),
    };

    if head != "SELECT" && head != "WITH" {
        return Err(format!(
            "statement must begin with SELECT or WITH, found '{}'",
            head
        ));
    }

    for token in &tokens {
        if MUTATING_KEYWORDS.contains(&token.as_str()) {
            return Err(format!("mutating keyword '{}' is not allowed", token));
        }
    }

    // A terminating semicolon is fine; content after one is not.
    let mut seen_semicolon = false;
    for token in &tokens {
        if token == ";" {
            seen_semicolon = true;
        } else if seen_semicolon {
            return Err("multiple statements are not allowed".to_string());
        }
    }

    Ok(())
}

/// Extracts uppercased bare words and `;` markers, skipping comments,
/// string literals, and quoted identifiers.
fn significant_tokens(sql: &str) -> std::result::Result<Vec<String>, String> {
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
                loop {
                    if i + 1 >= bytes.len() {
                        return Err("unterminated block comment".to_string());
                    }
                    if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            b'\'' => i = skip_quoted(bytes, i, b'\'')?,
            b'"' => i = skip_quoted(bytes, i, b'"')?,
            b'`' => i = skip_quoted(bytes, i, b'`')?,
            b'[' => {
                while i < bytes.len() && bytes[i] != b']' {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err("unterminated bracketed identifier".to_string());
                }
                i += 1;
            }
            b';' => {
                tokens.push(";".to_string());
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(sql[start..i].to_uppercase());
            }
            _ => i += 1,
        }
    }

    Ok(tokens)
}

/// Advances past a quoted region, honoring doubled-quote escapes.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> std::result::Result<usize, String> {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err("unterminated quoted region".to_string())
}
