//! Pipeline executor: runs the [`Stage`]s in order with skip-if-done,
//! progress reporting, cancellation, and a configurable failure policy.

use df_core::config::FailurePolicy;

use crate::context::RunContext;
use crate::stage::{Stage, StageResult};
use crate::stages::standard_stages;

/// How one stage ended.
#[derive(Debug)]
pub enum StageOutcome {
    /// Its artifacts already existed; no tool ran.
    Skipped,
    Completed(StageResult),
    Failed(df_core::Error),
}

/// Outcome of one stage in a [`RunReport`].
#[derive(Debug)]
pub struct StageRecord {
    pub name: &'static str,
    pub outcome: StageOutcome,
}

/// Per-stage outcomes of a run that was not cancelled.
#[derive(Debug, Default)]
pub struct RunReport {
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    /// Whether no stage failed.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Stages that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &df_core::Error)> {
        self.stages.iter().filter_map(|r| match &r.outcome {
            StageOutcome::Failed(e) => Some((r.name, e)),
            _ => None,
        })
    }

    /// Names of stages that were skipped because their output existed.
    pub fn skipped(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .filter(|r| matches!(r.outcome, StageOutcome::Skipped))
            .map(|r| r.name)
            .collect()
    }
}

/// What a run would do, as reported by [`PipelineExecutor::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub name: &'static str,
    /// Whether the stage would be skipped.
    pub done: bool,
}

/// Runs stages sequentially.
pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
    policy: FailurePolicy,
}

impl PipelineExecutor {
    /// Create a new executor from a list of stages.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            stages,
            policy: FailurePolicy::default(),
        }
    }

    /// The six dubbing stages.
    pub fn standard() -> Self {
        Self::new(standard_stages())
    }

    /// Builder: choose what happens after a failed stage.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report which stages would run, without running anything.
    pub fn plan(&self, ctx: &RunContext) -> Vec<StagePlan> {
        self.stages
            .iter()
            .map(|s| StagePlan {
                name: s.name(),
                done: s.is_done(ctx),
            })
            .collect()
    }

    /// Run every stage in order.
    ///
    /// A stage whose artifacts exist is skipped without invoking any tool.
    /// Under [`FailurePolicy::Continue`] a failed stage is recorded and the
    /// run moves on; later stages that need its output fail with
    /// [`df_core::Error::MissingArtifact`]. Once every stage has had its
    /// turn, a background task that is still running is waited for.
    ///
    /// # Errors
    ///
    /// [`df_core::Error::Cancelled`] if the run's token is cancelled, and
    /// under [`FailurePolicy::FailFast`] the first stage failure wrapped in
    /// [`df_core::Error::Pipeline`].
    pub async fn execute(&self, ctx: &RunContext) -> df_core::Result<RunReport> {
        if self.stages.is_empty() {
            return Err(df_core::Error::Pipeline {
                step: "executor".into(),
                message: "no stages to execute".into(),
            });
        }

        let total = self.stages.len() as f32;
        let mut report = RunReport::default();

        for (i, stage) in self.stages.iter().enumerate() {
            // Check cancellation between stages.
            if ctx.cancellation.is_cancelled() {
                tracing::info!("Pipeline cancelled");
                return Err(df_core::Error::Cancelled);
            }

            let pct = (i + 1) as f32 / total * 100.0;
            let outcome = if stage.is_done(ctx) {
                tracing::info!("[{pct:.0}%] Skipped: {} (already done)", stage.name());
                StageOutcome::Skipped
            } else {
                tracing::info!("Starting: {}", stage.name());
                let result = tokio::select! {
                    result = stage.execute(ctx) => result,
                    () = ctx.cancellation.cancelled() => Err(df_core::Error::Cancelled),
                };
                match result {
                    Ok(result) => {
                        tracing::info!("[{pct:.0}%] Completed: {}", stage.name());
                        StageOutcome::Completed(result)
                    }
                    Err(e) if e.is_cancelled() => {
                        tracing::info!("Pipeline cancelled during {}", stage.name());
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::error!("Stage {} failed: {e}", stage.name());
                        if self.policy == FailurePolicy::FailFast {
                            return Err(df_core::Error::pipeline(stage.name(), e.to_string()));
                        }
                        StageOutcome::Failed(e)
                    }
                }
            };
            ctx.progress.send(pct, stage.name());
            report.stages.push(StageRecord {
                name: stage.name(),
                outcome,
            });
        }

        self.drain_background(ctx).await?;
        Ok(report)
    }

    /// Let an unfinished background download complete before returning.
    async fn drain_background(&self, ctx: &RunContext) -> df_core::Result<()> {
        let Some(task) = ctx.background.get() else {
            return Ok(());
        };
        if task.is_finished() {
            return Ok(());
        }
        tracing::info!("Waiting for background {} to finish", task.name());
        tokio::select! {
            state = task.wait() => {
                tracing::debug!("Background {} ended: {state:?}", task.name());
                Ok(())
            }
            () = ctx.cancellation.cancelled() => Err(df_core::Error::Cancelled),
        }
    }
}
