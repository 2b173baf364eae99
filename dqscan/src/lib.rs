//! Library module for the dqscan binary.
//!
//! Exposes CSV ingestion and artifact persistence for integration
//! tests; the CLI surface itself lives in main.rs.

pub mod ingest;
pub mod output;
