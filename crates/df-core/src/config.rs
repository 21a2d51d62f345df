//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! tool and pipeline sections. Every section defaults sensibly so a
//! completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Locations searched when no explicit config path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &["./dubforge.toml", "~/.config/dubforge/config.toml"];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from `path`, or from the first default location
    /// that exists, or fall back to defaults.
    ///
    /// An explicitly given path must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_file(path);
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(candidate);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                return Self::load_file(candidate);
            }
        }

        tracing::debug!("No config file found; using defaults");
        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&contents)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let pipeline = &self.pipeline;

        if pipeline.sample_rate == 0 {
            warnings.push("pipeline.sample_rate is 0; the transcoder will reject it".into());
        }

        if pipeline.grace_period_secs == 0 {
            warnings.push(
                "pipeline.grace_period_secs is 0; the download is killed without a grace period"
                    .into(),
            );
        }

        if matches!(pipeline.title_substitute, '/' | '\\' | '\0') {
            warnings.push(format!(
                "pipeline.title_substitute {:?} is itself a path separator",
                pipeline.title_substitute
            ));
        }

        let mut outputs: Vec<&str> = Vec::new();
        for (i, variant) in pipeline.translations.iter().enumerate() {
            if variant.input == variant.output {
                warnings.push(format!(
                    "pipeline.translations[{i}] reads and writes the same suffix {}",
                    variant.output
                ));
            }
            if outputs.contains(&variant.output.as_str()) {
                warnings.push(format!(
                    "pipeline.translations[{i}].output {} is produced twice",
                    variant.output
                ));
            }
            outputs.push(&variant.output);
        }

        for subtitle in &pipeline.speech {
            if !subtitle.ends_with(".srt") {
                warnings.push(format!("pipeline.speech entry {subtitle} is not a .srt suffix"));
            }
        }

        let tracks = 1 + pipeline.speech.len();
        if pipeline.merge.default_track >= tracks {
            warnings.push(format!(
                "pipeline.merge.default_track {} is out of range for {tracks} audio tracks",
                pipeline.merge.default_track
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// External tool path overrides.
///
/// A configured path is used when it exists; otherwise the tool is searched
/// for in [`bin_dir`](Self::bin_dir) and then `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Directory searched before `PATH`. Defaults to `bin/` next to the
    /// running executable.
    pub bin_dir: Option<PathBuf>,
    pub yt_dlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub parakeet_path: Option<PathBuf>,
    pub whisper_path: Option<PathBuf>,
    pub translate_path: Option<PathBuf>,
    pub subtitle_translate_path: Option<PathBuf>,
    pub tts_path: Option<PathBuf>,
    /// Per-invocation limit applied to foreground tools. Unlimited if unset.
    pub timeout_secs: Option<u64>,
}

/// What the executor does after a stage fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure and run the remaining stages.
    #[default]
    Continue,
    /// Stop at the first failed stage.
    FailFast,
}

/// Settings for the stage pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root under which remote inputs get a `{title}` working directory.
    pub work_root: String,
    /// Sample rate required by the transcription tool.
    pub sample_rate: u32,
    /// Seconds the background download gets to exit after SIGTERM.
    pub grace_period_secs: u64,
    pub failure_policy: FailurePolicy,
    /// Replacement for path separators in remote titles.
    pub title_substitute: char,
    pub translation_service: String,
    /// Term-substitution table handed to the translation tools. Defaults to
    /// `config/fix.csv` next to the running executable.
    pub fix_file: Option<PathBuf>,
    pub voice: String,
    /// whisper-cpp model. Defaults to the large-v3-turbo model in the
    /// whisper-transcribe cache.
    pub whisper_model: Option<PathBuf>,
    pub whisper_threads: u32,
    pub translations: Vec<TranslationVariant>,
    /// Subtitle suffixes that get a synthesized speech track.
    pub speech: Vec<String>,
    pub merge: MergeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: "~/Downloads/output.transcribe".into(),
            sample_rate: 16_000,
            grace_period_secs: 5,
            failure_policy: FailurePolicy::Continue,
            title_substitute: ':',
            translation_service: "siliconflow".into(),
            fix_file: None,
            voice: "zh-CN-XiaoxiaoNeural".into(),
            whisper_model: None,
            whisper_threads: 6,
            translations: vec![TranslationVariant::text(), TranslationVariant::subtitle()],
            speech: vec![".zh.srt".into()],
            merge: MergeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// `work_root` with `~` expanded.
    pub fn work_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.work_root).as_ref())
    }

    /// The whisper-cpp model path, falling back to the cache default.
    pub fn whisper_model(&self) -> PathBuf {
        match &self.whisper_model {
            Some(path) => path.clone(),
            None => PathBuf::from(
                shellexpand::tilde(
                    "~/.cache/whisper-transcribe/models/ggml-large-v3-turbo.bin",
                )
                .as_ref(),
            ),
        }
    }
}

/// How a translation variant hands text to its tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    /// Plain text on stdin, translation on stdout.
    Text,
    /// Timed subtitle file in, timed subtitle file out.
    Subtitle,
}

/// One target-language artifact produced by the translate stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationVariant {
    pub kind: VariantKind,
    /// Suffix of the source artifact, e.g. `.srt`.
    pub input: String,
    /// Suffix of the produced artifact, e.g. `.zh.srt`.
    pub output: String,
    /// Tool to invoke; defaults to `translate` for text and
    /// `subtitle-translate` for subtitles.
    #[serde(default)]
    pub tool: Option<String>,
    /// Argument templates. Available variables: `{service}`, `{fix_file}`,
    /// `{input}`, `{output}`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl TranslationVariant {
    /// `.txt` to `.zh.txt` through the text translator.
    pub fn text() -> Self {
        Self {
            kind: VariantKind::Text,
            input: ".txt".into(),
            output: ".zh.txt".into(),
            tool: None,
            args: ["-s", "{service}", "-f", "{fix_file}"]
                .map(String::from)
                .to_vec(),
        }
    }

    /// `.srt` to `.zh.srt` through the subtitle translator.
    pub fn subtitle() -> Self {
        Self {
            kind: VariantKind::Subtitle,
            input: ".srt".into(),
            output: ".zh.srt".into(),
            tool: None,
            args: [
                "-s", "{service}", "-f", "{fix_file}", "-i", "{input}", "-o", "{output}", "-ab",
            ]
            .map(String::from)
            .to_vec(),
        }
    }

    /// The tool this variant invokes.
    pub fn tool_name(&self) -> &str {
        match (&self.tool, self.kind) {
            (Some(tool), _) => tool,
            (None, VariantKind::Text) => "translate",
            (None, VariantKind::Subtitle) => "subtitle-translate",
        }
    }
}

/// Settings for the final mux.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub output_suffix: String,
    /// Index of the audio track marked default. Track 0 is the original
    /// audio; synthesized tracks follow in `pipeline.speech` order.
    pub default_track: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            output_suffix: ".en-zh.mp4".into(),
            default_track: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.pipeline.sample_rate, 16_000);
        assert_eq!(config.pipeline.grace_period_secs, 5);
        assert_eq!(config.pipeline.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.pipeline.translations.len(), 2);
        assert_eq!(config.pipeline.speech, vec![".zh.srt".to_string()]);
        assert_eq!(config.pipeline.merge.default_track, 1);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn parses_variants_and_policy() {
        let toml = r#"
            [pipeline]
            failure_policy = "fail-fast"
            speech = [".zh.srt", ".zh.align.srt"]

            [[pipeline.translations]]
            kind = "subtitle"
            input = ".srt"
            output = ".zh.align.srt"
            args = ["-i", "{input}", "-o", "{output}", "--align"]

            [pipeline.merge]
            default_track = 2
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.pipeline.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.pipeline.translations.len(), 1);
        let variant = &config.pipeline.translations[0];
        assert_eq!(variant.kind, VariantKind::Subtitle);
        assert_eq!(variant.tool_name(), "subtitle-translate");
        assert_eq!(config.pipeline.merge.default_track, 2);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = Config::from_toml("[pipeline\nsample_rate = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validate_flags_out_of_range_default_track() {
        let mut config = Config::default();
        config.pipeline.merge.default_track = 5;
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("default_track")));
    }

    #[test]
    fn validate_flags_separator_substitute() {
        let mut config = Config::default();
        config.pipeline.title_substitute = '/';
        assert!(config
            .validate()
            .iter()
            .any(|w| w.contains("title_substitute")));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dubforge.toml");
        std::fs::write(&path, "[pipeline]\nvoice = \"zh-CN-YunxiNeural\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.pipeline.voice, "zh-CN-YunxiNeural");
    }
}
