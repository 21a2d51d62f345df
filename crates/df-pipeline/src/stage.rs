//! The [`Stage`] trait defines one step of the dubbing pipeline.
//!
//! A stage is done when the artifacts it produces are on disk. The executor
//! asks [`Stage::is_done`] first and only calls [`Stage::execute`] when there
//! is work left, which is what makes an interrupted run resumable.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::context::RunContext;

/// Result of a successfully executed stage.
#[derive(Debug, Clone, Default)]
pub struct StageResult {
    /// Artifacts written by this execution.
    pub produced: Vec<PathBuf>,
    /// Human-readable summary of what the stage did.
    pub summary: String,
}

impl StageResult {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            produced: Vec::new(),
            summary: summary.into(),
        }
    }

    /// Record an artifact written by the stage.
    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.produced.push(path);
        self
    }
}

/// A single step in the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// A short, human-readable name for this stage (e.g. "Transcribe").
    fn name(&self) -> &'static str;

    /// Whether everything this stage would produce already exists.
    fn is_done(&self, ctx: &RunContext) -> bool;

    /// Produce the stage's artifacts.
    ///
    /// A stage writes each artifact under a temporary name and renames it
    /// into place, or has the tool do the equivalent, so an artifact path
    /// only ever holds complete output.
    async fn execute(&self, ctx: &RunContext) -> df_core::Result<StageResult>;
}
