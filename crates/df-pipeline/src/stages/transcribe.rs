//! Speech recognition stage.

use async_trait::async_trait;
use df_av::ToolCommand;

use crate::context::RunContext;
use crate::resolver::{SUBTITLE, TRANSCRIPT};
use crate::stage::{Stage, StageResult};

/// Produce `{base}.srt` and `{base}.txt` from the 16 kHz audio.
///
/// parakeet-mlx is used when it is installed, whisper-cpp otherwise. The
/// 16 kHz file is removed afterwards unless it is the user's own input.
#[derive(Debug, Default)]
pub struct TranscribeStage;

impl TranscribeStage {
    fn parakeet(ctx: &RunContext) -> df_core::Result<ToolCommand> {
        let ws = &ctx.artifacts.working_set;
        let mut cmd = ctx.tools.command("parakeet-mlx")?;
        cmd.arg("--output-dir")
            .arg_path(ws.dir())
            .args(["--output-template", ws.base()])
            .args(["--output-format", "all"])
            .args(ctx.transcribe_args.iter().cloned())
            .arg_path(&ctx.artifacts.audio_16k());
        Ok(cmd)
    }

    fn whisper(ctx: &RunContext) -> df_core::Result<ToolCommand> {
        let mut cmd = ctx.tools.command("whisper-cpp")?;
        cmd.args(["-l", "auto", "-osrt", "-otxt", "-t"])
            .arg(ctx.config.whisper_threads.to_string())
            .args(["--prompt", "Hello."])
            .arg("-m")
            .arg_path(&ctx.config.whisper_model())
            .arg("-of")
            .arg_path(&ctx.artifacts.artifact(""))
            .args(ctx.transcribe_args.iter().cloned())
            .arg_path(&ctx.artifacts.audio_16k());
        Ok(cmd)
    }
}

#[async_trait]
impl Stage for TranscribeStage {
    fn name(&self) -> &'static str {
        "Transcribe"
    }

    fn is_done(&self, ctx: &RunContext) -> bool {
        ctx.artifacts.exists(SUBTITLE)
    }

    async fn execute(&self, ctx: &RunContext) -> df_core::Result<StageResult> {
        let audio_16k = ctx.artifacts.audio_16k();
        super::require(self.name(), &audio_16k)?;

        let cmd = if ctx.tools.has("parakeet-mlx") {
            tracing::info!("Transcribing with parakeet-mlx");
            Self::parakeet(ctx)?
        } else {
            tracing::info!("Transcribing with whisper-cpp");
            Self::whisper(ctx)?
        };
        ctx.runner.run(&cmd).await?;

        let subtitle = ctx.artifacts.artifact(SUBTITLE);
        super::require(self.name(), &subtitle)?;

        if !ctx.artifacts.is_local_input(&audio_16k) {
            if let Err(e) = std::fs::remove_file(&audio_16k) {
                tracing::warn!("Could not remove {}: {e}", audio_16k.display());
            }
        }

        let mut result = StageResult::new(format!("Transcribed {}", ctx.artifacts.working_set.base()))
            .with_output(subtitle);
        let transcript = ctx.artifacts.artifact(TRANSCRIPT);
        if transcript.exists() {
            result = result.with_output(transcript);
        }
        Ok(result)
    }
}
