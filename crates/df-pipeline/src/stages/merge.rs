//! Final mux of the video with every audio track.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use df_av::TaskState;

use crate::context::RunContext;
use crate::resolver::speech_suffix;
use crate::stage::{Stage, StageResult};

/// Mux the source video with its original audio and each synthesized speech
/// track into `{base}{output_suffix}`.
///
/// Waits for the background video download first. The video stream is
/// copied; audio is encoded as AAC.
#[derive(Debug, Default)]
pub struct MergeStage;

/// `(index, disposition)` for each of `count` audio tracks. Exactly one
/// track, `default` clamped to the last track, is marked `default`.
pub fn audio_dispositions(count: usize, default: usize) -> Vec<(usize, &'static str)> {
    let default = default.min(count.saturating_sub(1));
    (0..count)
        .map(|i| (i, if i == default { "default" } else { "0" }))
        .collect()
}

/// ffmpeg arguments for muxing `video` (input 0, also the source of the
/// original audio) with `tracks` (inputs 1..) into `output`.
pub fn merge_args(video: &Path, tracks: &[PathBuf], default: usize, output: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-i".into(), video.to_string_lossy().into_owned()];
    for track in tracks {
        args.push("-i".into());
        args.push(track.to_string_lossy().into_owned());
    }

    args.extend(["-map", "0:v"].map(String::from));
    for (i, disposition) in audio_dispositions(tracks.len() + 1, default) {
        args.extend([
            String::from("-map"),
            format!("{i}:a"),
            format!("-disposition:a:{i}"),
            disposition.to_string(),
        ]);
    }

    args.extend(["-c:v", "copy", "-c:a", "aac"].map(String::from));
    args.push(output.to_string_lossy().into_owned());
    args
}

#[async_trait]
impl Stage for MergeStage {
    fn name(&self) -> &'static str {
        "Merge"
    }

    fn is_done(&self, ctx: &RunContext) -> bool {
        ctx.artifacts.exists(&ctx.config.merge.output_suffix)
    }

    async fn execute(&self, ctx: &RunContext) -> df_core::Result<StageResult> {
        let artifacts = &ctx.artifacts;

        if let Some(task) = ctx.background.get() {
            if !task.is_finished() {
                tracing::info!("Waiting for video download to finish");
            }
            match task.wait().await {
                TaskState::Cancelled => return Err(df_core::Error::Cancelled),
                state if !state.is_success() => {
                    tracing::warn!("Video download ended badly: {state:?}");
                }
                _ => tracing::info!("Video download finished"),
            }
        }

        super::require(self.name(), &artifacts.video)?;
        let tracks: Vec<PathBuf> = ctx
            .config
            .speech
            .iter()
            .map(|s| artifacts.artifact(&speech_suffix(s)))
            .collect();
        for track in &tracks {
            super::require(self.name(), track)?;
        }

        let suffix = &ctx.config.merge.output_suffix;
        let target = artifacts.artifact(suffix);
        let temp = artifacts.working_set.temp_artifact(suffix);
        super::discard(&temp);

        tracing::info!("Merging {} audio tracks into {}", tracks.len() + 1, target.display());
        let mut cmd = ctx.tools.command("ffmpeg")?;
        cmd.args(merge_args(
            &artifacts.video,
            &tracks,
            ctx.config.merge.default_track,
            &temp,
        ));

        if let Err(e) = ctx.runner.run(&cmd).await {
            super::discard(&temp);
            return Err(e);
        }

        let output = df_av::finalize(&temp, &target)?;
        Ok(StageResult::new(format!("Merged {}", output.display())).with_output(output))
    }
}
