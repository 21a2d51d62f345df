//! The six pipeline stages, in execution order.

mod acquire;
mod merge;
mod preprocess;
mod synthesize;
mod transcribe;
mod translate;

use std::path::Path;

pub use acquire::AcquireStage;
pub use merge::{audio_dispositions, merge_args, MergeStage};
pub use preprocess::PreprocessStage;
pub use synthesize::SynthesizeStage;
pub use transcribe::TranscribeStage;
pub use translate::TranslateStage;

use crate::stage::Stage;

/// Acquire, preprocess, transcribe, translate, synthesize, merge.
pub fn standard_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(AcquireStage),
        Box::new(PreprocessStage),
        Box::new(TranscribeStage),
        Box::new(TranslateStage),
        Box::new(SynthesizeStage),
        Box::new(MergeStage),
    ]
}

/// Fail with [`df_core::Error::MissingArtifact`] unless `path` exists.
fn require(stage: &str, path: &Path) -> df_core::Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(df_core::Error::missing(stage, path))
    }
}

/// Best-effort removal of a scratch file after a failed tool run.
fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Could not remove {}: {e}", path.display());
        }
    }
}
