//! Execution context shared by all stages in a pipeline run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use df_av::{BackgroundTask, ToolRegistry, ToolRunner};
use df_core::config::PipelineConfig;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::resolver::Artifacts;

/// Sender for reporting progress from within the executor.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and a
/// human-readable step description.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress, step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Holder for the at-most-one background download of a run.
///
/// Shared between the stages (which fill and await it) and the
/// cancellation controller (which stops it).
#[derive(Debug, Clone, Default)]
pub struct BackgroundSlot {
    inner: Arc<Mutex<Option<BackgroundTask>>>,
}

impl BackgroundSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the run's background task.
    ///
    /// # Errors
    ///
    /// A run owns at most one background task; a second one is refused.
    pub fn set(&self, task: BackgroundTask) -> df_core::Result<()> {
        let mut slot = self.inner.lock();
        if let Some(existing) = slot.as_ref() {
            return Err(df_core::Error::Internal(format!(
                "background task {} already running",
                existing.name()
            )));
        }
        *slot = Some(task);
        Ok(())
    }

    /// A handle to the background task, if one was started.
    pub fn get(&self) -> Option<BackgroundTask> {
        self.inner.lock().clone()
    }
}

/// Context passed to every stage.
pub struct RunContext {
    /// Resolved paths for this run.
    pub artifacts: Arc<Artifacts>,
    pub config: Arc<PipelineConfig>,
    /// Tool registry for building commands.
    pub tools: Arc<ToolRegistry>,
    /// Executes every external command of the run.
    pub runner: Arc<dyn ToolRunner>,
    /// Arguments passed through to the transcription tool.
    pub transcribe_args: Vec<String>,
    /// Term-substitution table handed to the translators.
    pub fix_file: PathBuf,
    /// Cancelled when the run is interrupted.
    pub cancellation: CancellationToken,
    pub background: BackgroundSlot,
    /// Channel for reporting progress to the caller.
    pub progress: Arc<ProgressSender>,
}

impl RunContext {
    /// Create a new context with the minimum required fields.
    pub fn new(
        artifacts: Artifacts,
        config: Arc<PipelineConfig>,
        tools: Arc<ToolRegistry>,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        let fix_file = config.fix_file.clone().unwrap_or_else(default_fix_file);
        Self {
            artifacts: Arc::new(artifacts),
            config,
            tools,
            runner,
            transcribe_args: Vec::new(),
            fix_file,
            cancellation: CancellationToken::new(),
            background: BackgroundSlot::new(),
            progress: Arc::new(ProgressSender::noop()),
        }
    }

    /// Builder: pass extra arguments to the transcription tool.
    pub fn with_transcribe_args(mut self, args: Vec<String>) -> Self {
        self.transcribe_args = args;
        self
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: share a background slot created before the context, so an
    /// interrupt listener can hold it from the start of the run.
    pub fn with_background(mut self, background: BackgroundSlot) -> Self {
        self.background = background;
        self
    }

    /// Builder: attach a progress sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// How long a background process gets between SIGTERM and SIGKILL.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.config.grace_period_secs)
    }
}

/// `config/fix.csv` next to the running executable.
fn default_fix_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("config").join("fix.csv")))
        .unwrap_or_else(|| PathBuf::from("config/fix.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_av::TaskState;

    #[test]
    fn background_slot_holds_one_task() {
        let slot = BackgroundSlot::new();
        assert!(slot.get().is_none());

        slot.set(BackgroundTask::completed("yt-dlp", TaskState::Cancelled))
            .unwrap();
        let shared = slot.clone();
        assert_eq!(shared.get().unwrap().name(), "yt-dlp");

        let err = slot
            .set(BackgroundTask::completed("yt-dlp", TaskState::Cancelled))
            .unwrap_err();
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn progress_sender_forwards() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sender = ProgressSender::new(move |pct, step| sink.lock().push((pct, step.to_string())));
        sender.send(50.0, "Transcribe");
        assert_eq!(seen.lock().as_slice(), &[(50.0, "Transcribe".to_string())]);
    }
}
