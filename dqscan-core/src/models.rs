//! Core data models for the profiling pipeline.
//!
//! These are the immutable artifacts handed forward between stages:
//! schema snapshot, query specs, query results, and the rendered report.
//! All models are serializable; the query list and raw results are
//! persisted as JSON artifacts alongside the report.

use serde::{Deserialize, Serialize};

/// SQLite column affinity derived from the declared type.
///
/// Follows the SQLite affinity rules: the declared type string decides
/// how values are coerced, which in turn decides which profiling queries
/// apply (numeric statistics vs. categorical summaries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnAffinity {
    Integer,
    Real,
    Numeric,
    Text,
    Blob,
}

impl ColumnAffinity {
    /// Maps a declared column type to its affinity.
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.to_uppercase();
        if upper.contains("INT") {
            ColumnAffinity::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnAffinity::Text
        } else if upper.contains("BLOB") || upper.is_empty() {
            ColumnAffinity::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnAffinity::Real
        } else {
            ColumnAffinity::Numeric
        }
    }

    /// True for affinities that hold numbers (statistics and outlier
    /// scans apply).
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnAffinity::Integer | ColumnAffinity::Real | ColumnAffinity::Numeric
        )
    }

    /// True for text affinity (categorical summaries apply).
    pub fn is_textual(self) -> bool {
        self == ColumnAffinity::Text
    }
}

/// Column metadata as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    pub affinity: ColumnAffinity,
    pub ordinal_position: u32,
}

impl ColumnDescriptor {
    /// Creates a descriptor, deriving the affinity from the declared type.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, ordinal: u32) -> Self {
        let declared_type = declared_type.into();
        let affinity = ColumnAffinity::from_declared_type(&declared_type);
        Self {
            name: name.into(),
            declared_type,
            affinity,
            ordinal_position: ordinal,
        }
    }
}

/// A table with its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    /// Looks up a column by name (case-insensitive, SQLite semantics).
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Immutable schema snapshot, one per pipeline run.
///
/// Tables are kept in enumeration order (sorted by name) and columns in
/// declaration order so that rule-based generation is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSchema>,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

impl SchemaSnapshot {
    /// Creates a snapshot from collected tables.
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self {
            tables,
            captured_at: chrono::Utc::now(),
        }
    }

    /// Looks up a table by name (case-insensitive).
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// True when a column with this name exists anywhere in the snapshot.
    pub fn has_column(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.column(name).is_some())
    }

    /// True when the snapshot holds no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Query classification carried on every spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryCategory {
    /// Descriptive statistics (counts, distributions, min/max/mean)
    Profiling,
    /// Defect detection (nulls, duplicates, outliers, referential checks)
    DataQuality,
}

impl std::fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryCategory::Profiling => write!(f, "Profiling"),
            QueryCategory::DataQuality => write!(f, "Data Quality"),
        }
    }
}

/// The concrete check a spec implements.
///
/// The renderer uses this to read well-known result columns when building
/// the findings digest; model-generated queries are `Generated` and only
/// contribute raw tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckKind {
    RowAndNullCount,
    DuplicateRows,
    DistinctProfile,
    NumericStats,
    OutlierScan,
    ReferentialIntegrity,
    Generated,
}

/// A single generated query, immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub id: String,
    pub category: QueryCategory,
    pub kind: CheckKind,
    pub table: String,
    /// Column the check targets, when the check is column-scoped
    pub column: Option<String>,
    pub sql: String,
}

/// Execution status of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Ok,
    Failed,
}

/// Why a query failed without aborting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The spec was classified as a write and never reached the store
    WriteQueryRejected,
    /// The per-query timeout budget was exceeded
    Timeout,
    /// The store reported an error (syntax, missing table, type mismatch)
    ExecutionFailed,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::WriteQueryRejected => write!(f, "WriteQueryRejected"),
            FailureReason::Timeout => write!(f, "Timeout"),
            FailureReason::ExecutionFailed => write!(f, "ExecutionFailed"),
        }
    }
}

/// Failure detail attached to a failed `QueryResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub reason: FailureReason,
    pub message: String,
}

/// Outcome of executing one `QuerySpec`. One per spec, same order.
///
/// Row values retain the store's native typing: integers, floats, text,
/// and nulls map to the corresponding JSON values; BLOBs are encoded as
/// `base64:`-prefixed strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query_id: String,
    pub status: QueryStatus,
    pub rows: Vec<serde_json::Value>,
    pub failure: Option<QueryFailure>,
}

impl QueryResult {
    /// Creates a successful result.
    pub fn ok(query_id: impl Into<String>, rows: Vec<serde_json::Value>) -> Self {
        Self {
            query_id: query_id.into(),
            status: QueryStatus::Ok,
            rows,
            failure: None,
        }
    }

    /// Creates a failed result.
    pub fn failed(
        query_id: impl Into<String>,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            status: QueryStatus::Failed,
            rows: Vec::new(),
            failure: Some(QueryFailure {
                reason,
                message: message.into(),
            }),
        }
    }

    /// True when the query executed successfully.
    pub fn is_ok(&self) -> bool {
        self.status == QueryStatus::Ok
    }
}

/// A generated query dropped before execution.
///
/// Rejections are never silent: they are persisted with the query
/// artifact and listed in the report's Failures section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedQuery {
    pub sql: String,
    pub reason: String,
}

/// Body of a report section: a data table or narrative lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionBody {
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Narrative(Vec<String>),
}

/// One titled section of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub body: SectionBody,
}

/// Aggregate counts plus the narrative findings digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_queries: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rejected: usize,
    pub findings: Vec<String>,
}

/// Terminal artifact of the pipeline, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Present only when the renderer is configured to stamp reports,
    /// keeping rendering deterministic for identical inputs otherwise.
    pub generated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub sections: Vec<ReportSection>,
    pub summary: ReportSummary,
}

impl Report {
    /// Sections holding data tables (excludes failures and summary).
    pub fn data_section_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| matches!(s.body, SectionBody::Table { .. }))
            .count()
    }
}
