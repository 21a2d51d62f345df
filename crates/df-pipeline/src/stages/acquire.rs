//! Download stage for remote inputs.

use async_trait::async_trait;

use crate::context::RunContext;
use crate::resolver::{RunInput, SUBTITLE};
use crate::stage::{Stage, StageResult};

/// Fetch the audio track in the foreground and start the video download in
/// the background. Local inputs have nothing to acquire.
#[derive(Debug, Default)]
pub struct AcquireStage;

impl AcquireStage {
    fn needs_audio(ctx: &RunContext) -> bool {
        let a = &ctx.artifacts;
        !(a.audio.exists() || a.exists(SUBTITLE))
    }

    fn needs_video(ctx: &RunContext) -> bool {
        let a = &ctx.artifacts;
        a.video != a.audio
            && !(a.video.exists()
                || a.exists(&ctx.config.merge.output_suffix)
                || ctx.background.get().is_some())
    }
}

#[async_trait]
impl Stage for AcquireStage {
    fn name(&self) -> &'static str {
        "Acquire"
    }

    fn is_done(&self, ctx: &RunContext) -> bool {
        match ctx.artifacts.input {
            RunInput::Local(_) => true,
            RunInput::Remote(_) => !Self::needs_audio(ctx) && !Self::needs_video(ctx),
        }
    }

    async fn execute(&self, ctx: &RunContext) -> df_core::Result<StageResult> {
        let RunInput::Remote(ref url) = ctx.artifacts.input else {
            return Ok(StageResult::new("Local input"));
        };
        let mut result = StageResult::new(format!("Acquired {url}"));

        // The video download is independent of the audio, so a failed audio
        // fetch still leaves it running for the next attempt.
        let audio = if Self::needs_audio(ctx) {
            tracing::info!("Downloading audio from {url}");
            let mut cmd = ctx.tools.command("yt-dlp")?;
            cmd.args(["--extract-audio", "--audio-format", "wav", "-o"])
                .arg_path(&ctx.artifacts.audio)
                .arg(url.as_str());
            Some(ctx.runner.run(&cmd).await.map(|_| ctx.artifacts.audio.clone()))
        } else {
            None
        };

        if Self::needs_video(ctx) {
            tracing::info!("Downloading video in background");
            let mut cmd = ctx.tools.background_command("yt-dlp")?;
            cmd.arg(url.as_str()).arg("-o").arg_path(&ctx.artifacts.video);
            let task = ctx.runner.spawn(
                &cmd,
                ctx.cancellation.child_token(),
                ctx.grace_period(),
            )?;
            ctx.background.set(task)?;
        }

        if let Some(audio) = audio {
            result = result.with_output(audio?);
        }
        Ok(result)
    }
}
