//! End-to-end pipeline tests over an in-memory SQLite store.
//!
//! These exercise the full stage sequence (inspect, generate, execute,
//! render) against real data, including per-query failure isolation and
//! model-assisted candidate validation.

use async_trait::async_trait;
use dqscan_core::generate::{
    GenerationOutcome, GenerationStrategy, ModelAssistedGenerator, PromptContext,
    RuleBasedGenerator, TextGenerator,
};
use dqscan_core::models::{
    CheckKind, FailureReason, QueryCategory, QuerySpec, SchemaSnapshot, SectionBody,
};
use dqscan_core::pipeline::{Pipeline, PipelineConfig, PipelineState};
use dqscan_core::store::{SqliteStore, StoreAdapter, StoreOptions};
use dqscan_core::Result;
use std::sync::Arc;

/// Opens a writable in-memory store seeded with an `emp` table carrying
/// known defects: two NULL names, one duplicated row, and one dangling
/// manager reference.
async fn seeded_store() -> SqliteStore {
    let store = SqliteStore::connect_with(":memory:", StoreOptions::writable())
        .await
        .unwrap();

    sqlx::query("CREATE TABLE emp (id INTEGER, name TEXT, mgr_id INTEGER)")
        .execute(&store.pool)
        .await
        .unwrap();
    for row in [
        "(1, 'alice', NULL)",
        "(2, 'bob', 1)",
        "(3, NULL, 1)",
        "(3, NULL, 1)",
        "(4, 'dana', 99)",
    ] {
        sqlx::query(&format!("INSERT INTO emp VALUES {row}"))
            .execute(&store.pool)
            .await
            .unwrap();
    }

    store
}

#[tokio::test]
async fn test_rule_based_run_reaches_done() {
    let store = seeded_store().await;
    let pipeline = Pipeline::new(Box::new(RuleBasedGenerator), PipelineConfig::default());

    let run = pipeline.run(&store).await;
    store.close().await;

    assert!(run.is_done());
    assert_eq!(
        run.transitions,
        vec![
            PipelineState::Idle,
            PipelineState::SchemaFetched,
            PipelineState::QueriesGenerated,
            PipelineState::Executed,
            PipelineState::Rendered,
            PipelineState::Done,
        ]
    );

    let generation = run.generation.unwrap();
    assert_eq!(generation.specs.len(), 8);
    assert!(generation.rejected.is_empty());

    // One result per spec, in order, all successful
    assert_eq!(run.results.len(), 8);
    let spec_ids: Vec<&str> = generation.specs.iter().map(|s| s.id.as_str()).collect();
    let result_ids: Vec<&str> = run.results.iter().map(|r| r.query_id.as_str()).collect();
    assert_eq!(spec_ids, result_ids);
    assert!(run.results.iter().all(dqscan_core::models::QueryResult::is_ok));

    let report = run.report.unwrap();
    assert_eq!(report.summary.total_queries, 8);
    assert_eq!(report.summary.succeeded, 8);
    assert_eq!(report.summary.failed, 0);

    // The seeded defects all surface in the findings digest
    let findings = report.summary.findings.join("\n");
    assert!(findings.contains("emp.name: 2 of 5 rows are NULL"), "{findings}");
    assert!(findings.contains("emp: 1 duplicate rows"), "{findings}");
    assert!(findings.contains("emp.mgr_id: 1 referential violations"), "{findings}");
}

/// Strategy wrapping the rule templates plus one broken statement, to
/// prove executor failures stay per-query.
struct WithBrokenQuery;

#[async_trait]
impl GenerationStrategy for WithBrokenQuery {
    fn name(&self) -> &'static str {
        "with-broken-query"
    }

    async fn generate(&self, snapshot: &SchemaSnapshot) -> Result<GenerationOutcome> {
        let mut outcome = RuleBasedGenerator.generate(snapshot).await?;
        outcome.specs.push(QuerySpec {
            id: "emp.broken".to_string(),
            category: QueryCategory::Profiling,
            kind: CheckKind::Generated,
            table: "emp".to_string(),
            column: None,
            sql: "SELEC COUNT(*) FROM emp".to_string(),
        });
        Ok(outcome)
    }
}

#[tokio::test]
async fn test_query_failure_is_data_not_pipeline_failure() {
    let store = seeded_store().await;
    let pipeline = Pipeline::new(Box::new(WithBrokenQuery), PipelineConfig::default());

    let run = pipeline.run(&store).await;
    store.close().await;

    assert!(run.is_done());
    assert!(run.failure.is_none());
    assert_eq!(run.results.len(), 9);

    let broken = run
        .results
        .iter()
        .find(|r| r.query_id == "emp.broken")
        .unwrap();
    let failure = broken.failure.as_ref().unwrap();
    assert_eq!(failure.reason, FailureReason::ExecutionFailed);
    assert!(failure.message.to_lowercase().contains("syntax"));

    let report = run.report.unwrap();
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.succeeded, 8);

    let failures = report
        .sections
        .iter()
        .find(|s| s.title == "Failures")
        .unwrap();
    let SectionBody::Narrative(lines) = &failures.body else {
        panic!("Failures section must be narrative");
    };
    assert!(lines.iter().any(|l| l.contains("emp.broken")));
}

/// Fixed-output collaborator for the model-assisted path.
struct ScriptedGenerator;

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_queries(&self, _context: &PromptContext) -> Result<Vec<String>> {
        Ok(vec![
            "SELECT COUNT(*) AS n FROM emp WHERE name IS NULL".to_string(),
            "SELECT salary FROM emp".to_string(),
            "DELETE FROM emp".to_string(),
        ])
    }
}

#[tokio::test]
async fn test_model_assisted_run_filters_and_reports() {
    let store = seeded_store().await;
    let strategy = ModelAssistedGenerator::new(Arc::new(ScriptedGenerator));
    let pipeline = Pipeline::new(Box::new(strategy), PipelineConfig::default());

    let run = pipeline.run(&store).await;
    store.close().await;

    assert!(run.is_done());
    let generation = run.generation.unwrap();
    assert_eq!(generation.specs.len(), 1);
    assert_eq!(generation.rejected.len(), 2);
    assert_eq!(generation.specs.len() + generation.rejected.len(), 3);

    // The accepted query ran against the store
    assert_eq!(run.results.len(), 1);
    assert!(run.results[0].is_ok());
    assert_eq!(run.results[0].rows[0]["n"], serde_json::json!(2));

    // Both rejections surface in the report, not just the logs
    let report = run.report.unwrap();
    assert_eq!(report.summary.rejected, 2);
    let failures = report
        .sections
        .iter()
        .find(|s| s.title == "Failures")
        .unwrap();
    let SectionBody::Narrative(lines) = &failures.body else {
        panic!("Failures section must be narrative");
    };
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.contains("salary")));
    assert!(lines.iter().any(|l| l.contains("not a read query")));
}

#[tokio::test]
async fn test_run_against_file_backed_store() {
    // The connection string is honored end to end; nothing is hardwired
    // to a fixed database path.
    let dir = std::env::temp_dir().join("dqscan-pipeline-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("run.db");
    let _ = std::fs::remove_file(&path);
    let conn = path.to_string_lossy().to_string();

    let writer = SqliteStore::connect_with(&conn, StoreOptions::writable())
        .await
        .unwrap();
    sqlx::query("CREATE TABLE readings (id INTEGER, value REAL)")
        .execute(&writer.pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO readings VALUES (1, 0.5), (2, 0.6), (3, 120.0)")
        .execute(&writer.pool)
        .await
        .unwrap();
    writer.close().await;

    let store = SqliteStore::connect(&conn).await.unwrap();
    let run = Pipeline::new(Box::new(RuleBasedGenerator), PipelineConfig::default())
        .run(&store)
        .await;
    store.close().await;
    let _ = std::fs::remove_file(&path);

    assert!(run.is_done());
    assert!(run.results.iter().all(|r| r.is_ok()));
}
