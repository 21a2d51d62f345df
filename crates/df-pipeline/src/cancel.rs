//! Interrupt handling for a pipeline run.
//!
//! The controller starts in [`ControllerState::Running`]. The first SIGINT
//! or SIGTERM moves it to [`ControllerState::Terminating`]: the run's token
//! is cancelled, which stops the foreground tool and makes the executor
//! return, and the background download is stopped within its grace period.

use std::sync::Arc;

use df_av::TaskState;
use parking_lot::Mutex;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::BackgroundSlot;

/// Where the run is in its shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Running,
    Terminating,
}

/// Turns an interrupt signal into an orderly stop of the run.
#[derive(Debug, Clone)]
pub struct CancellationController {
    token: CancellationToken,
    background: BackgroundSlot,
    state: Arc<Mutex<ControllerState>>,
}

impl CancellationController {
    pub fn new(token: CancellationToken, background: BackgroundSlot) -> Self {
        Self {
            token,
            background,
            state: Arc::new(Mutex::new(ControllerState::Running)),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    /// Spawn a task that waits for SIGINT or SIGTERM and then terminates
    /// the run. The task finishes once the background download is gone.
    pub fn listen(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            interrupt_signal().await;
            controller.terminate().await;
        })
    }

    /// Cancel the run and stop the background download.
    ///
    /// Only the first call does anything; later calls return immediately
    /// with `None`.
    pub async fn terminate(&self) -> Option<TaskState> {
        {
            let mut state = self.state.lock();
            if *state == ControllerState::Terminating {
                return None;
            }
            *state = ControllerState::Terminating;
        }

        tracing::warn!("Interrupted, stopping");
        self.token.cancel();

        let task = self.background.get()?;
        if task.is_finished() {
            return Some(task.state());
        }
        let state = task.cancel().await;
        tracing::info!("Downloading video canceled");
        Some(state)
    }
}

/// Resolves on the first SIGINT (Ctrl+C) or, on unix, SIGTERM.
async fn interrupt_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_av::{BackgroundTask, ToolCommand};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn terminate_cancels_token_once() {
        let token = CancellationToken::new();
        let controller = CancellationController::new(token.clone(), BackgroundSlot::new());
        assert_eq!(controller.state(), ControllerState::Running);

        assert_eq!(controller.terminate().await, None);
        assert!(token.is_cancelled());
        assert_eq!(controller.state(), ControllerState::Terminating);
        assert_eq!(controller.terminate().await, None);
    }

    #[tokio::test]
    async fn finished_background_keeps_its_state() {
        let slot = BackgroundSlot::new();
        let done = TaskState::Finished {
            success: true,
            code: Some(0),
        };
        slot.set(BackgroundTask::completed("yt-dlp", done.clone()))
            .unwrap();
        let controller = CancellationController::new(CancellationToken::new(), slot);
        assert_eq!(controller.terminate().await, Some(done));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn running_background_is_stopped_within_grace() {
        let token = CancellationToken::new();
        let slot = BackgroundSlot::new();
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.args(["-c", "sleep 30"]);
        let task =
            BackgroundTask::launch(&cmd, token.child_token(), Duration::from_millis(500)).unwrap();
        slot.set(task.clone()).unwrap();

        let controller = CancellationController::new(token, slot);
        let started = Instant::now();
        let state = controller.terminate().await;
        assert_eq!(state, Some(TaskState::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(task.is_finished());
    }
}
