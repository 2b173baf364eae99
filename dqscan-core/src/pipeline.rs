//! Pipeline state machine.
//!
//! Sequences the four stages over a shared store connection:
//!
//! ```text
//! Idle -> SchemaFetched -> QueriesGenerated -> Executed -> Rendered -> Done
//! ```
//!
//! with a terminal `Failed` state reachable from any stage. Execution is
//! strictly sequential and single-threaded; each stage completes before
//! the next begins and artifacts only flow forward. Per-query failures
//! inside the executor are data, never pipeline failures. The schema,
//! generation, and render stages each carry a [`StagePolicy`] deciding
//! whether their failure is fatal or downgraded to a warning with an
//! empty output.

use crate::error::DqScanError;
use crate::execute::{ExecutorConfig, QueryExecutor};
use crate::generate::{GenerationOutcome, GenerationStrategy};
use crate::inspect::SchemaInspector;
use crate::models::{QueryResult, Report, SchemaSnapshot};
use crate::render::{RendererConfig, ReportRenderer};
use crate::store::StoreAdapter;
use serde::{Deserialize, Serialize};

/// Pipeline progression states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    #[default]
    Idle,
    SchemaFetched,
    QueriesGenerated,
    Executed,
    Rendered,
    Done,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "Idle",
            PipelineState::SchemaFetched => "SchemaFetched",
            PipelineState::QueriesGenerated => "QueriesGenerated",
            PipelineState::Executed => "Executed",
            PipelineState::Rendered => "Rendered",
            PipelineState::Done => "Done",
            PipelineState::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}

/// The stage a failure or warning originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Schema,
    Generate,
    Execute,
    Render,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Schema => "schema",
            Stage::Generate => "generate",
            Stage::Execute => "execute",
            Stage::Render => "render",
        };
        write!(f, "{name}")
    }
}

/// Per-stage failure policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagePolicy {
    /// When set, a stage failure is downgraded to a warning and the
    /// pipeline proceeds with an empty output for that stage.
    pub allow_failure: bool,
}

impl StagePolicy {
    /// Policy that tolerates stage failure.
    pub fn recoverable() -> Self {
        Self {
            allow_failure: true,
        }
    }
}

/// Pipeline configuration: per-stage policies plus executor and renderer
/// settings. The executor has no policy because its per-query failures
/// never escalate to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub schema: StagePolicy,
    pub generation: StagePolicy,
    pub render: StagePolicy,
    pub executor: ExecutorConfig,
    pub renderer: RendererConfig,
}

/// Fatal stage failure carried on the run record.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: DqScanError,
}

/// Everything one pipeline run produced.
///
/// Intermediate artifacts survive a fatal failure so the caller can
/// still persist whatever exists; nothing is dropped silently.
#[derive(Debug, Default)]
pub struct PipelineRun {
    pub state: PipelineState,
    /// Every state entered, in order, starting with `Idle`.
    pub transitions: Vec<PipelineState>,
    /// Recoverable stage failures, one message per downgraded error.
    pub warnings: Vec<String>,
    pub snapshot: Option<SchemaSnapshot>,
    pub generation: Option<GenerationOutcome>,
    pub results: Vec<QueryResult>,
    pub report: Option<Report>,
    pub failure: Option<StageFailure>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            transitions: vec![PipelineState::Idle],
            ..Self::default()
        }
    }

    fn advance(&mut self, state: PipelineState) {
        tracing::info!("Pipeline: {} -> {}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }

    fn fail(&mut self, stage: Stage, error: DqScanError) {
        tracing::error!("Pipeline failed in {} stage: {}", stage, error);
        self.failure = Some(StageFailure { stage, error });
        self.advance(PipelineState::Failed);
    }

    fn warn(&mut self, stage: Stage, error: &DqScanError) {
        let message = format!("{stage} stage failed, continuing with empty output: {error}");
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    /// True when the run completed end to end.
    pub fn is_done(&self) -> bool {
        self.state == PipelineState::Done
    }
}

/// Four-stage profiling pipeline over a store connection.
pub struct Pipeline {
    strategy: Box<dyn GenerationStrategy>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline with the given generation strategy.
    pub fn new(strategy: Box<dyn GenerationStrategy>, config: PipelineConfig) -> Self {
        Self { strategy, config }
    }

    /// Runs all stages against the store.
    ///
    /// Never panics and never returns early with an error: the outcome,
    /// fatal or not, is always the complete run record. The caller owns
    /// the store connection and releases it after the run, on every exit
    /// path.
    pub async fn run(&self, store: &dyn StoreAdapter) -> PipelineRun {
        let mut run = PipelineRun::new();
        tracing::info!("Starting profiling pipeline ({})", self.strategy.name());

        let snapshot = match SchemaInspector.inspect(store).await {
            Ok(snapshot) => snapshot,
            Err(e) if self.config.schema.allow_failure => {
                run.warn(Stage::Schema, &e);
                SchemaSnapshot::new(Vec::new())
            }
            Err(e) => {
                run.fail(Stage::Schema, e);
                return run;
            }
        };
        run.snapshot = Some(snapshot.clone());
        run.advance(PipelineState::SchemaFetched);

        let generation = match self.strategy.generate(&snapshot).await {
            Ok(outcome) => outcome,
            Err(e) if self.config.generation.allow_failure => {
                run.warn(Stage::Generate, &e);
                GenerationOutcome::default()
            }
            Err(e) => {
                run.fail(Stage::Generate, e);
                return run;
            }
        };
        run.generation = Some(generation.clone());
        run.advance(PipelineState::QueriesGenerated);

        let executor = QueryExecutor::new(self.config.executor.clone());
        run.results = executor.execute(store, &generation.specs).await;
        run.advance(PipelineState::Executed);

        let renderer = ReportRenderer::new(self.config.renderer);
        match renderer.render(&generation.specs, &run.results, &generation.rejected) {
            Ok(report) => {
                run.report = Some(report);
                run.advance(PipelineState::Rendered);
            }
            Err(e) if self.config.render.allow_failure => {
                run.warn(Stage::Render, &e);
                run.advance(PipelineState::Rendered);
            }
            Err(e) => {
                run.fail(Stage::Render, e);
                return run;
            }
        }

        run.advance(PipelineState::Done);
        tracing::info!(
            "Pipeline finished: {} queries, {} warnings",
            run.results.len(),
            run.warnings.len()
        );
        run
    }
}
