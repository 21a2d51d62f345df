//! Resample the source audio for transcription.

use async_trait::async_trait;

use crate::context::RunContext;
use crate::resolver::SUBTITLE;
use crate::stage::{Stage, StageResult};

/// Convert the source audio to mono at the transcription sample rate.
///
/// ffmpeg writes to `{base}.tmp.wav` and the result is renamed over the
/// target, so the 16 kHz path never holds a half-written file. For remote
/// inputs the target is the downloaded audio itself.
#[derive(Debug, Default)]
pub struct PreprocessStage;

#[async_trait]
impl Stage for PreprocessStage {
    fn name(&self) -> &'static str {
        "Preprocess"
    }

    fn is_done(&self, ctx: &RunContext) -> bool {
        ctx.artifacts.exists(SUBTITLE)
    }

    async fn execute(&self, ctx: &RunContext) -> df_core::Result<StageResult> {
        let artifacts = &ctx.artifacts;
        super::require(self.name(), &artifacts.audio)?;

        let target = artifacts.audio_16k();
        let temp = artifacts
            .working_set
            .temp_artifact(artifacts.audio_16k_suffix());
        super::discard(&temp);

        tracing::info!("Resampling audio to {} Hz", ctx.config.sample_rate);
        let mut cmd = ctx.tools.command("ffmpeg")?;
        cmd.args(["-y", "-i"])
            .arg_path(&artifacts.audio)
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(ctx.config.sample_rate.to_string())
            .arg_path(&temp);

        if let Err(e) = ctx.runner.run(&cmd).await {
            super::discard(&temp);
            return Err(e);
        }

        let output = df_av::finalize(&temp, &target)?;
        Ok(StageResult::new(format!("Resampled to {}", output.display())).with_output(output))
    }
}
