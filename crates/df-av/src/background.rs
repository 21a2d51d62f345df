//! Handle for the one long-running tool that overlaps the foreground stages.
//!
//! [`BackgroundTask::launch`] spawns the child and hands it to a supervisor
//! task that owns it exclusively. Everything else talks to the supervisor
//! through a [`CancellationToken`] and a `watch` channel, so the handle can
//! be cloned freely and observed from a signal listener without touching
//! the process.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;

/// Lifecycle of a background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// The process is still running.
    Running,
    /// The process exited on its own.
    Finished {
        success: bool,
        code: Option<i32>,
    },
    /// The process was stopped through [`BackgroundTask::cancel`] or the run's
    /// cancellation token.
    Cancelled,
    /// Waiting on the process failed.
    Failed(String),
}

impl TaskState {
    /// Whether the task has not reached a terminal state yet.
    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Running)
    }

    /// Whether the process exited on its own with status 0.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskState::Finished { success: true, .. })
    }
}

impl From<ExitStatus> for TaskState {
    fn from(status: ExitStatus) -> Self {
        TaskState::Finished {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// A cloneable handle to a supervised background process.
#[derive(Debug, Clone)]
pub struct BackgroundTask {
    name: String,
    state: watch::Receiver<TaskState>,
    cancel: CancellationToken,
}

impl BackgroundTask {
    /// Spawn `cmd` and start supervising it.
    ///
    /// The task stops when `token` (or any parent of it) is cancelled: the
    /// process receives SIGTERM, gets `grace` to exit, and is killed after
    /// that. Must be called from within a tokio runtime.
    pub fn launch(
        cmd: &ToolCommand,
        token: CancellationToken,
        grace: Duration,
    ) -> df_core::Result<Self> {
        let name = cmd.tool_name();
        let child = cmd.spawn()?;
        let (tx, rx) = watch::channel(TaskState::Running);

        tracing::debug!("Background task started: {cmd}");
        tokio::spawn(supervise(name.clone(), child, token.clone(), grace, tx));

        Ok(Self {
            name,
            state: rx,
            cancel: token,
        })
    }

    /// A handle for work that has already reached `state`.
    ///
    /// Useful for runners that complete the work synchronously.
    pub fn completed(name: impl Into<String>, state: TaskState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self {
            name: name.into(),
            state: rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Name of the supervised tool.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state without waiting.
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Whether the task has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        !self.state.borrow().is_running()
    }

    /// Wait until the process has exited and return how it ended.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(|s| !s.is_running()).await {
            return state.clone();
        }
        // The sender only goes away after publishing a terminal state; if it
        // did not, the supervisor itself died.
        let state = rx.borrow().clone();
        if state.is_running() {
            TaskState::Failed("supervisor exited".into())
        } else {
            state
        }
    }

    /// Stop the process and wait for it to be gone.
    ///
    /// Returns within the grace period given at launch plus the time needed
    /// to reap a killed process. A task that already finished keeps its
    /// state.
    pub async fn cancel(&self) -> TaskState {
        if !self.is_finished() {
            self.cancel.cancel();
        }
        self.wait().await
    }
}

async fn supervise(
    name: String,
    mut child: Child,
    token: CancellationToken,
    grace: Duration,
    tx: watch::Sender<TaskState>,
) {
    let state = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => TaskState::from(status),
            Err(e) => TaskState::Failed(format!("failed to wait for {name}: {e}")),
        },
        () = token.cancelled() => {
            terminate(&name, &mut child, grace).await;
            TaskState::Cancelled
        }
    };

    match &state {
        TaskState::Finished { success: true, .. } => tracing::debug!("{name} finished"),
        TaskState::Finished { code, .. } => {
            tracing::warn!("{name} exited with code {}", code.map_or("?".into(), |c| c.to_string()))
        }
        TaskState::Failed(message) => tracing::warn!("{message}"),
        _ => {}
    }
    let _ = tx.send(state);
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
async fn terminate(name: &str, child: &mut Child, grace: Duration) {
    if request_exit(name, child, grace).await {
        return;
    }
    if let Err(e) = child.kill().await {
        tracing::debug!("Killing {name} failed: {e}");
    }
}

/// Returns `true` if the child exited within `grace` after SIGTERM.
#[cfg(unix)]
async fn request_exit(name: &str, child: &mut Child, grace: Duration) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(raw) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return false;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        tracing::debug!("SIGTERM to {name} failed: {e}");
    }
    if tokio::time::timeout(grace, child.wait()).await.is_ok() {
        return true;
    }
    tracing::warn!("{name} did not exit within {grace:?}; killing");
    false
}

#[cfg(not(unix))]
async fn request_exit(_name: &str, _child: &mut Child, _grace: Duration) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    fn sh(script: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn wait_returns_natural_exit() {
        let task =
            BackgroundTask::launch(&sh("exit 0"), CancellationToken::new(), Duration::from_secs(5))
                .unwrap();
        assert!(task.wait().await.is_success());
        assert!(task.is_finished());
    }

    #[tokio::test]
    async fn wait_reports_failure_code() {
        let task =
            BackgroundTask::launch(&sh("exit 4"), CancellationToken::new(), Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            task.wait().await,
            TaskState::Finished {
                success: false,
                code: Some(4)
            }
        );
    }

    #[tokio::test]
    async fn cancel_stops_cooperative_process() {
        let task = BackgroundTask::launch(
            &sh("sleep 30"),
            CancellationToken::new(),
            Duration::from_secs(5),
        )
        .unwrap();
        let started = Instant::now();
        assert_eq!(task.cancel().await, TaskState::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancel_is_bounded_when_sigterm_is_ignored() {
        let grace = Duration::from_millis(300);
        let task = BackgroundTask::launch(
            &sh("trap '' TERM; sleep 30"),
            CancellationToken::new(),
            grace,
        )
        .unwrap();
        // Let the shell install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        assert_eq!(task.cancel().await, TaskState::Cancelled);
        assert!(started.elapsed() >= grace);
        assert!(started.elapsed() < grace + Duration::from_secs(2));
    }

    #[tokio::test]
    async fn parent_token_cancels_task() {
        let run = CancellationToken::new();
        let task =
            BackgroundTask::launch(&sh("sleep 30"), run.child_token(), Duration::from_secs(5))
                .unwrap();
        let observer = task.clone();

        run.cancel();
        assert_eq!(observer.wait().await, TaskState::Cancelled);
    }

    #[tokio::test]
    async fn cancel_after_finish_keeps_state() {
        let task =
            BackgroundTask::launch(&sh("exit 0"), CancellationToken::new(), Duration::from_secs(5))
                .unwrap();
        task.wait().await;
        assert!(task.cancel().await.is_success());
    }

    #[test]
    fn completed_handle_is_finished() {
        let task = BackgroundTask::completed(
            "yt-dlp",
            TaskState::Finished {
                success: true,
                code: Some(0),
            },
        );
        assert!(task.is_finished());
        assert_eq!(task.name(), "yt-dlp");
    }
}
