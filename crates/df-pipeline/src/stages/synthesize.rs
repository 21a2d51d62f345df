//! Text-to-speech stage.

use async_trait::async_trait;

use crate::context::RunContext;
use crate::resolver::speech_suffix;
use crate::stage::{Stage, StageResult};

/// Voice each configured subtitle as an mp3 track, `{base}.zh.srt` to
/// `{base}.zh.mp3`, through `{base}.zh.tmp.mp3`.
#[derive(Debug, Default)]
pub struct SynthesizeStage;

#[async_trait]
impl Stage for SynthesizeStage {
    fn name(&self) -> &'static str {
        "Synthesize"
    }

    fn is_done(&self, ctx: &RunContext) -> bool {
        ctx.config
            .speech
            .iter()
            .all(|s| ctx.artifacts.exists(&speech_suffix(s)))
    }

    async fn execute(&self, ctx: &RunContext) -> df_core::Result<StageResult> {
        let ws = &ctx.artifacts.working_set;
        let mut result = StageResult::new(format!("Voiced with {}", ctx.config.voice));

        for subtitle_suffix in &ctx.config.speech {
            let audio_suffix = speech_suffix(subtitle_suffix);
            let target = ws.artifact(&audio_suffix);
            if target.exists() {
                continue;
            }
            let subtitle = ws.artifact(subtitle_suffix);
            if !subtitle.exists() {
                tracing::warn!(
                    "Skipping speech for {}: subtitle does not exist",
                    subtitle.display()
                );
                continue;
            }

            let temp = ws.temp_artifact(&audio_suffix);
            super::discard(&temp);

            tracing::info!("Synthesizing speech from {}", subtitle.display());
            let mut cmd = ctx.tools.command("edge-srt-to-speech")?;
            cmd.args(["--voice", ctx.config.voice.as_str()])
                .arg_path(&subtitle)
                .arg_path(&temp);

            if let Err(e) = ctx.runner.run(&cmd).await {
                super::discard(&temp);
                return Err(e);
            }
            result = result.with_output(df_av::finalize(&temp, &target)?);
        }

        Ok(result)
    }
}
