//! The seam between the pipeline and the operating system.
//!
//! Stages never spawn processes themselves; they hand a [`ToolCommand`] to a
//! [`ToolRunner`]. [`SystemRunner`] executes it for real.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::background::BackgroundTask;
use crate::command::{ToolCommand, ToolOutput};

/// Executes external tools on behalf of the pipeline.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `cmd` to completion. Each call is attempted exactly once.
    async fn run(&self, cmd: &ToolCommand) -> df_core::Result<ToolOutput>;

    /// Start `cmd` without waiting for it. The process is stopped when
    /// `token` is cancelled, with `grace` between SIGTERM and SIGKILL.
    fn spawn(
        &self,
        cmd: &ToolCommand,
        token: CancellationToken,
        grace: Duration,
    ) -> df_core::Result<BackgroundTask>;
}

/// Runs tools as child processes through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, cmd: &ToolCommand) -> df_core::Result<ToolOutput> {
        tracing::debug!("exec: {cmd}");
        cmd.execute().await
    }

    fn spawn(
        &self,
        cmd: &ToolCommand,
        token: CancellationToken,
        grace: Duration,
    ) -> df_core::Result<BackgroundTask> {
        BackgroundTask::launch(cmd, token, grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[tokio::test]
    async fn system_runner_is_object_safe() {
        let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.args(["-c", "echo ready"]).capture(true);
        let out = runner.run(&cmd).await.unwrap();
        assert_eq!(out.text(), "ready");
    }

    #[tokio::test]
    async fn system_runner_spawns_background() {
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.args(["-c", "exit 0"]);
        let task = SystemRunner
            .spawn(&cmd, CancellationToken::new(), Duration::from_secs(1))
            .unwrap();
        assert!(task.wait().await.is_success());
    }
}
