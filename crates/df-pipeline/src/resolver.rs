//! Artifact resolution: from a run input to the paths every stage works on.

use std::fmt;
use std::path::{Path, PathBuf};

use df_av::{ToolRegistry, ToolRunner, WorkingSet};
use df_core::config::PipelineConfig;

/// Timed subtitle in the source language.
pub const SUBTITLE: &str = ".srt";
/// Plain transcript in the source language.
pub const TRANSCRIPT: &str = ".txt";
/// Downloaded audio, and the 16 kHz audio unless that would clobber a local input.
pub const AUDIO: &str = ".wav";
/// 16 kHz audio for a local input with a `wav` extension in any case.
const AUDIO_16K_ALT: &str = ".16k.wav";

/// Speech-track suffix for a subtitle suffix: `.zh.srt` becomes `.zh.mp3`.
pub fn speech_suffix(subtitle: &str) -> String {
    let stem = subtitle.strip_suffix(SUBTITLE).unwrap_or(subtitle);
    format!("{stem}.mp3")
}

/// What the user asked to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunInput {
    /// A media file on disk.
    Local(PathBuf),
    /// An `http://` or `https://` locator understood by the downloader.
    Remote(String),
}

impl RunInput {
    /// Classify a command-line argument.
    pub fn parse(arg: &str) -> Self {
        if is_remote(arg) {
            RunInput::Remote(arg.to_string())
        } else {
            RunInput::Local(PathBuf::from(arg))
        }
    }

    /// Whether the input has to be downloaded.
    pub fn is_remote(&self) -> bool {
        matches!(self, RunInput::Remote(_))
    }
}

impl fmt::Display for RunInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunInput::Local(path) => write!(f, "{}", path.display()),
            RunInput::Remote(url) => f.write_str(url),
        }
    }
}

fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

fn is_remote(arg: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        arg.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Resolved paths for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub input: RunInput,
    pub working_set: WorkingSet,
    /// Source audio: the download target, or the local input itself.
    pub audio: PathBuf,
    /// Source video: the background download target, or the local input.
    pub video: PathBuf,
    audio_16k_suffix: &'static str,
}

impl Artifacts {
    /// Paths for a local media file. Runs no tools.
    pub fn local(path: &Path) -> df_core::Result<Self> {
        let base = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                df_core::Error::Validation(format!("{} has no file name", path.display()))
            })?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let working_set = WorkingSet::new(dir, base);

        let audio_16k_suffix = if has_wav_extension(path) {
            AUDIO_16K_ALT
        } else {
            AUDIO
        };

        Ok(Self {
            input: RunInput::Local(path.to_path_buf()),
            working_set,
            audio: path.to_path_buf(),
            video: path.to_path_buf(),
            audio_16k_suffix,
        })
    }

    /// Paths for a remote locator whose title and extension are already
    /// known.
    pub fn remote(url: &str, working_set: WorkingSet, video_ext: &str) -> Self {
        Self {
            input: RunInput::Remote(url.to_string()),
            audio: working_set.artifact(AUDIO),
            video: working_set.artifact(&format!(".{video_ext}")),
            working_set,
            audio_16k_suffix: AUDIO,
        }
    }

    /// Suffix of the 16 kHz transcription input.
    pub fn audio_16k_suffix(&self) -> &'static str {
        self.audio_16k_suffix
    }

    /// Path of the 16 kHz transcription input.
    pub fn audio_16k(&self) -> PathBuf {
        self.working_set.artifact(self.audio_16k_suffix)
    }

    /// Whether `path` names the user's local input file. Compared without
    /// regard to case, since the working directory may not distinguish it.
    pub fn is_local_input(&self, path: &Path) -> bool {
        match &self.input {
            RunInput::Local(input) => input
                .to_string_lossy()
                .eq_ignore_ascii_case(&path.to_string_lossy()),
            RunInput::Remote(_) => false,
        }
    }

    /// Path of an artifact in this run's working set.
    pub fn artifact(&self, suffix: &str) -> PathBuf {
        self.working_set.artifact(suffix)
    }

    /// Whether an artifact in this run's working set exists.
    pub fn exists(&self, suffix: &str) -> bool {
        self.working_set.exists(suffix)
    }
}

/// Resolve `input` to its working set and artifact paths.
///
/// Remote inputs cost two blocking metadata queries (title, then file name)
/// and create `{work_root}/{title}` if it does not exist. Local inputs run
/// nothing. Calling this twice for the same input yields the same paths.
///
/// # Errors
///
/// Fails if a metadata query fails or returns no title, or if the working
/// directory cannot be created.
pub async fn resolve(
    input: &RunInput,
    runner: &dyn ToolRunner,
    tools: &ToolRegistry,
    config: &PipelineConfig,
) -> df_core::Result<Artifacts> {
    let url = match input {
        RunInput::Local(path) => return Artifacts::local(path),
        RunInput::Remote(url) => url,
    };

    let mut cmd = tools.command("yt-dlp")?;
    cmd.arg("--get-title").arg(url.as_str()).capture(true);
    let title_output = runner.run(&cmd).await?;
    let title = title_output.text().lines().next().unwrap_or_default().trim();
    if title.is_empty() {
        return Err(df_core::Error::Validation(format!("no title reported for {url}")));
    }
    let base = sanitize_title(title, config.title_substitute);

    let working_set = WorkingSet::new(config.work_root().join(&base), base);
    working_set.ensure_dir()?;

    let mut cmd = tools.command("yt-dlp")?;
    cmd.arg("--get-filename").arg(url.as_str()).capture(true);
    let name_output = runner.run(&cmd).await?;
    let ext = video_extension(name_output.text());

    tracing::debug!(
        "Resolved {url} to {} ({ext})",
        working_set.artifact("").display()
    );
    Ok(Artifacts::remote(url, working_set, &ext))
}

/// Make a remote title safe to use as a single path component.
///
/// Path separators and NUL become `substitute` (or `_` if `substitute` is
/// itself unsafe). `.` and `..` are prefixed so they cannot walk the
/// directory tree, and an empty title becomes `untitled`.
pub fn sanitize_title(title: &str, substitute: char) -> String {
    let substitute = if is_unsafe(substitute) { '_' } else { substitute };
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| if is_unsafe(c) { substitute } else { c })
        .collect();

    match cleaned.as_str() {
        "" => "untitled".into(),
        "." | ".." => format!("_{cleaned}"),
        _ => cleaned,
    }
}

fn is_unsafe(c: char) -> bool {
    matches!(c, '/' | '\\' | '\0')
}

/// Extension of the file name the downloader would write, `mp4` if none.
fn video_extension(filename: &str) -> String {
    let first = filename.lines().next().unwrap_or_default().trim();
    match first.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains(['/', '\\', ' ']) => ext.to_string(),
        _ => "mp4".into(),
    }
}
