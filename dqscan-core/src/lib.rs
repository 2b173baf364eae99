//! Core library for dqscan: a data-quality profiling pipeline.
//!
//! Profiles a tabular dataset in a relational store through four
//! deterministic stages: schema inspection, query generation, read-only
//! query execution, and report rendering. The stages are sequenced by an
//! explicit state machine with typed contracts between them.
//!
//! # Safety Boundaries
//! - All store operations during profiling are read-only
//! - Generated SQL is untrusted: every candidate is validated against
//!   the schema snapshot and the write-query guard before execution
//! - Credentials for the text-generation collaborator travel in an
//!   explicit configuration struct, never read from ambient process
//!   state
//!
//! # Architecture
//! - `store`: object-safe adapter over the relational engine
//! - `inspect` / `generate` / `execute` / `render`: the four stages
//! - `pipeline`: the state machine sequencing them
//! - `models`: the immutable artifacts passed forward between stages

pub mod error;
pub mod execute;
pub mod generate;
pub mod inspect;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod store;

// Re-export commonly used types
pub use error::{DqScanError, Result};
pub use execute::{ExecutorConfig, QueryExecutor};
pub use generate::{
    GenerationOutcome, GenerationStrategy, HttpTextGenerator, ModelAssistedGenerator,
    RuleBasedGenerator, TextGenConfig, TextGenerator,
};
pub use inspect::SchemaInspector;
pub use logging::init_logging;
pub use models::{
    ColumnDescriptor, QueryCategory, QueryResult, QuerySpec, RejectedQuery, Report, SchemaSnapshot,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineRun, PipelineState, Stage, StagePolicy};
pub use render::{RendererConfig, ReportRenderer};
pub use store::{SqliteStore, StoreAdapter, StoreOptions};
