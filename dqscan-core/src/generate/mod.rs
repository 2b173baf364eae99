//! Query generation stage.
//!
//! Polymorphic over a generation strategy:
//! - `rule`: deterministic templates derived from the snapshot
//! - `model`: delegation to an external text-generation service, with
//!   every candidate validated against the snapshot before acceptance
//! - `textgen`: the text-generation collaborator interface and its HTTP
//!   implementation

use crate::Result;
use crate::models::{QuerySpec, RejectedQuery, SchemaSnapshot};
use async_trait::async_trait;

pub mod model;
pub mod rule;
pub mod textgen;

pub use model::ModelAssistedGenerator;
pub use rule::RuleBasedGenerator;
pub use textgen::{HttpTextGenerator, PromptContext, TextGenConfig, TextGenerator};

/// What a strategy produced: accepted specs plus every dropped
/// candidate. Rejections are carried forward so they reach the report
/// and the persisted query artifact; nothing is dropped silently.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub specs: Vec<QuerySpec>,
    pub rejected: Vec<RejectedQuery>,
}

/// A query-generation strategy.
///
/// Implementations must only emit specs whose tables and columns exist
/// in the snapshot; the executor additionally enforces the read-only
/// boundary on everything it is handed.
#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    /// Strategy name for logs and the report.
    fn name(&self) -> &'static str;

    /// Produces the ordered query list for a snapshot.
    async fn generate(&self, snapshot: &SchemaSnapshot) -> Result<GenerationOutcome>;
}
