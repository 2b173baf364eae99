//! Report rendering stage.
//!
//! Converts query results into a [`Report`]: one tabular section per
//! successful result grouped by category, a Failures section listing
//! every failed result and rejected generated query, and a summary with
//! counts plus a narrative digest of detected issues. Rendering is
//! deterministic for identical inputs; the timestamp is opt-in.

use crate::Result;
use crate::error::DqScanError;
use crate::models::{
    CheckKind, QueryCategory, QueryResult, QuerySpec, RejectedQuery, Report, ReportSection,
    ReportSummary, SectionBody,
};
use askama::Template;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Renderer configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RendererConfig {
    /// Stamp the report with the generation time. Off by default so
    /// identical inputs render identical reports.
    pub stamp: bool,
}

/// Builds a [`Report`] from execution results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRenderer {
    config: RendererConfig,
}

impl ReportRenderer {
    /// Creates a renderer with the given configuration.
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Renders results into a report.
    ///
    /// # Errors
    /// Returns `Render` when a result references a query id absent from
    /// the spec list; every result must originate from the same run.
    pub fn render(
        &self,
        specs: &[QuerySpec],
        results: &[QueryResult],
        rejected: &[RejectedQuery],
    ) -> Result<Report> {
        let by_id: HashMap<&str, &QuerySpec> =
            specs.iter().map(|s| (s.id.as_str(), s)).collect();

        for result in results {
            if !by_id.contains_key(result.query_id.as_str()) {
                return Err(DqScanError::render_failed(format!(
                    "orphan query result '{}'",
                    result.query_id
                )));
            }
        }

        let mut sections = Vec::new();
        for category in [QueryCategory::Profiling, QueryCategory::DataQuality] {
            for result in results {
                let spec = by_id[result.query_id.as_str()];
                if spec.category != category || !result.is_ok() {
                    continue;
                }
                sections.push(ReportSection {
                    title: format!("{}: {}", category, spec.id),
                    body: table_body(&result.rows),
                });
            }
        }

        let failures = failure_lines(&by_id, results, rejected);
        if !failures.is_empty() {
            sections.push(ReportSection {
                title: "Failures".to_string(),
                body: SectionBody::Narrative(failures),
            });
        }

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let summary = ReportSummary {
            total_queries: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            rejected: rejected.len(),
            findings: findings_digest(&by_id, results),
        };

        tracing::info!(
            "Rendered report: {} sections, {} findings",
            sections.len(),
            summary.findings.len()
        );

        Ok(Report {
            generated_at: self.config.stamp.then(chrono::Utc::now),
            sections,
            summary,
        })
    }
}

/// Builds a table body from result rows: headers from the first row's
/// keys (column order is preserved), one formatted row per result row.
fn table_body(rows: &[JsonValue]) -> SectionBody {
    let headers: Vec<String> = rows
        .first()
        .and_then(JsonValue::as_object)
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default();

    if headers.is_empty() {
        return SectionBody::Narrative(vec!["No rows returned.".to_string()]);
    }

    let body_rows = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| format_cell(row.get(h).unwrap_or(&JsonValue::Null)))
                .collect()
        })
        .collect();

    SectionBody::Table {
        headers,
        rows: body_rows,
    }
}

fn format_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) => s.replace('|', "\\|"),
        other => other.to_string(),
    }
}

/// One diagnostic line per failed result and per rejected candidate.
fn failure_lines(
    by_id: &HashMap<&str, &QuerySpec>,
    results: &[QueryResult],
    rejected: &[RejectedQuery],
) -> Vec<String> {
    let mut lines = Vec::new();

    for result in results {
        let Some(failure) = &result.failure else {
            continue;
        };
        let spec = by_id[result.query_id.as_str()];
        lines.push(format!(
            "{} ({} on {}): {}",
            result.query_id, failure.reason, spec.table, failure.message
        ));
    }

    for candidate in rejected {
        lines.push(format!(
            "rejected before execution: {} in '{}'",
            candidate.reason, candidate.sql
        ));
    }

    lines
}

/// Narrative digest of detected issues, read from the well-known result
/// columns of each check kind. Generated queries contribute raw tables
/// only; their result shape is not interpretable.
fn findings_digest(by_id: &HashMap<&str, &QuerySpec>, results: &[QueryResult]) -> Vec<String> {
    let mut findings = Vec::new();

    for result in results {
        if !result.is_ok() {
            continue;
        }
        let spec = by_id[result.query_id.as_str()];
        let Some(row) = result.rows.first() else {
            continue;
        };

        let scope = match &spec.column {
            Some(column) => format!("{}.{}", spec.table, column),
            None => spec.table.clone(),
        };

        match spec.kind {
            CheckKind::RowAndNullCount => {
                if let Some(nulls) = metric(row, "null_count").filter(|n| *n > 0) {
                    let total = metric(row, "total_rows").unwrap_or(0);
                    findings.push(format!("{scope}: {nulls} of {total} rows are NULL"));
                }
            }
            CheckKind::DuplicateRows => {
                if let Some(dups) = metric(row, "duplicate_rows").filter(|n| *n > 0) {
                    findings.push(format!("{scope}: {dups} duplicate rows"));
                }
            }
            CheckKind::OutlierScan => {
                if let Some(outliers) = metric(row, "outlier_count").filter(|n| *n > 0) {
                    findings.push(format!("{scope}: {outliers} values outside the IQR fences"));
                }
            }
            CheckKind::ReferentialIntegrity => {
                if let Some(violations) = metric(row, "violations").filter(|n| *n > 0) {
                    findings.push(format!("{scope}: {violations} referential violations"));
                }
            }
            CheckKind::DistinctProfile | CheckKind::NumericStats | CheckKind::Generated => {}
        }
    }

    findings
}

/// Reads an integer metric from a result row.
fn metric(row: &JsonValue, key: &str) -> Option<i64> {
    match row.get(key)? {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

#[derive(Template)]
#[template(
    source = "# Data Quality Report
{% match generated_at %}{% when Some(ts) %}
_Generated: {{ ts }}_
{% when None %}{% endmatch %}{% for section in sections %}
## {{ section.title }}

{{ section.body }}
{% endfor %}
## Summary

- Total queries: {{ total_queries }}
- Succeeded: {{ succeeded }}
- Failed: {{ failed }}
- Rejected before execution: {{ rejected }}
{% if findings.is_empty() %}
No data-quality findings.
{% else %}
### Findings

{% for finding in findings %}- {{ finding }}
{% endfor %}{% endif %}",
    ext = "md",
    escape = "none"
)]
struct ReportTemplate {
    generated_at: Option<String>,
    sections: Vec<MarkdownSection>,
    total_queries: usize,
    succeeded: usize,
    failed: usize,
    rejected: usize,
    findings: Vec<String>,
}

struct MarkdownSection {
    title: String,
    body: String,
}

impl Report {
    /// Renders the report as a Markdown document.
    ///
    /// # Errors
    /// Returns `Render` when the template engine fails.
    pub fn to_markdown(&self) -> Result<String> {
        let sections = self
            .sections
            .iter()
            .map(|section| MarkdownSection {
                title: section.title.clone(),
                body: markdown_section_body(&section.body),
            })
            .collect();

        let template = ReportTemplate {
            generated_at: self.generated_at.map(|ts| ts.to_rfc3339()),
            sections,
            total_queries: self.summary.total_queries,
            succeeded: self.summary.succeeded,
            failed: self.summary.failed,
            rejected: self.summary.rejected,
            findings: self.summary.findings.clone(),
        };

        template
            .render()
            .map_err(|e| DqScanError::render_failed(format!("Markdown template: {e}")))
    }
}

fn markdown_section_body(body: &SectionBody) -> String {
    match body {
        SectionBody::Table { headers, rows } => {
            let mut lines = Vec::with_capacity(rows.len() + 2);
            lines.push(format!("| {} |", headers.join(" | ")));
            lines.push(format!("| {} |", vec!["---"; headers.len()].join(" | ")));
            for row in rows {
                lines.push(format!("| {} |", row.join(" | ")));
            }
            lines.join("\n")
        }
        SectionBody::Narrative(lines) => lines
            .iter()
            .map(|line| format!("- {line}"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
