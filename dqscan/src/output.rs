//! Artifact persistence for pipeline runs.
//!
//! Three files land in the output directory: the generated query list
//! (accepted specs plus rejected candidates), the raw execution results,
//! and the rendered Markdown report. Whatever artifacts exist are
//! written even when the run failed partway, so nothing is dropped
//! silently.

use dqscan_core::error::DqScanError;
use dqscan_core::pipeline::PipelineRun;
use dqscan_core::Result;
use std::path::Path;

/// File name of the generated query artifact.
pub const QUERIES_FILE: &str = "queries.json";
/// File name of the raw execution results artifact.
pub const RESULTS_FILE: &str = "results.json";
/// File name of the rendered report.
pub const REPORT_FILE: &str = "report.md";

/// Writes every artifact the run produced into `dir`, creating it if
/// needed. Returns the list of files written.
pub async fn write_artifacts(dir: &Path, run: &PipelineRun) -> Result<Vec<String>> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| DqScanError::Io {
        context: format!("Failed to create output directory {}", dir.display()),
        source: e,
    })?;

    let mut written = Vec::new();

    let (specs, rejected) = match &run.generation {
        Some(outcome) => (outcome.specs.as_slice(), outcome.rejected.as_slice()),
        None => (&[][..], &[][..]),
    };
    let queries = serde_json::json!({
        "specs": specs,
        "rejected": rejected,
    });
    write_json(&dir.join(QUERIES_FILE), &queries).await?;
    written.push(QUERIES_FILE.to_string());

    let results = serde_json::to_value(&run.results).map_err(|e| DqScanError::Serialization {
        context: "Failed to serialize query results".to_string(),
        source: e,
    })?;
    write_json(&dir.join(RESULTS_FILE), &results).await?;
    written.push(RESULTS_FILE.to_string());

    if let Some(report) = &run.report {
        let markdown = report.to_markdown()?;
        tokio::fs::write(dir.join(REPORT_FILE), markdown)
            .await
            .map_err(|e| DqScanError::Io {
                context: format!("Failed to write report to {}", dir.display()),
                source: e,
            })?;
        written.push(REPORT_FILE.to_string());
    }

    tracing::info!("Wrote {} artifacts to {}", written.len(), dir.display());
    Ok(written)
}

async fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value).map_err(|e| DqScanError::Serialization {
        context: format!("Failed to serialize {}", path.display()),
        source: e,
    })?;
    tokio::fs::write(path, pretty)
        .await
        .map_err(|e| DqScanError::Io {
            context: format!("Failed to write {}", path.display()),
            source: e,
        })
}
