//! Unified error type for dubforge.
//!
//! All crates funnel their failures into [`Error`]. Stage failures carry the
//! stage name so the executor can report them without losing context.

use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in dubforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (yt-dlp, ffmpeg, whisper-cpp, etc.) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A stage's required input does not exist.
    #[error("Missing artifact for {stage}: {}", path.display())]
    MissingArtifact {
        /// The stage that needed the artifact.
        stage: String,
        /// Where the artifact was expected.
        path: PathBuf,
    },

    /// A pipeline stage failed.
    #[error("Pipeline error [{step}]: {message}")]
    Pipeline {
        /// The pipeline stage that failed.
        step: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The run was interrupted.
    #[error("Cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Pipeline`].
    pub fn pipeline(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::MissingArtifact`].
    pub fn missing(stage: impl Into<String>, path: &Path) -> Self {
        Error::MissingArtifact {
            stage: stage.into(),
            path: path.to_path_buf(),
        }
    }

    /// Whether this error is the result of an interrupt rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
    }

    #[test]
    fn missing_artifact_display() {
        let err = Error::missing("Transcribe", Path::new("/work/talk.wav"));
        assert_eq!(
            err.to_string(),
            "Missing artifact for Transcribe: /work/talk.wav"
        );
    }

    #[test]
    fn pipeline_display() {
        let err = Error::pipeline("Merge", "ffmpeg failed");
        assert_eq!(err.to_string(), "Pipeline error [Merge]: ffmpeg failed");
    }

    #[test]
    fn cancelled_is_not_a_failure() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Internal("boom".into()).is_cancelled());
    }
}
