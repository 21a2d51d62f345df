//! Working set of a pipeline run.
//!
//! A [`WorkingSet`] is a directory plus a base name. Every artifact of a run
//! lives at `{dir}/{base}{suffix}`; the file existing is the only record that
//! the stage producing it has completed.

use std::path::{Path, PathBuf};

/// Directory and base name shared by every artifact of one run.
///
/// Paths are built by appending the suffix to the base name, never by
/// replacing an extension, so a base such as `Dr. Who` keeps its dot.
///
/// # Example
///
/// ```
/// use df_av::WorkingSet;
///
/// let ws = WorkingSet::new("/videos", "talk");
/// assert_eq!(ws.artifact(".zh.srt"), std::path::Path::new("/videos/talk.zh.srt"));
/// assert_eq!(ws.temp_artifact(".zh.mp3"), std::path::Path::new("/videos/talk.zh.tmp.mp3"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSet {
    dir: PathBuf,
    base: String,
}

impl WorkingSet {
    /// Create a working set rooted at `dir` with the given base name.
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
        }
    }

    /// The working directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The base name every artifact starts with.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path of the artifact with `suffix`.
    pub fn artifact(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{suffix}", self.base))
    }

    /// Whether the artifact with `suffix` is on disk.
    pub fn exists(&self, suffix: &str) -> bool {
        self.artifact(suffix).exists()
    }

    /// Scratch path for an artifact being written: `.tmp` goes in front of
    /// the last extension so tools that sniff the extension still see it.
    pub fn temp_artifact(&self, suffix: &str) -> PathBuf {
        match suffix.rfind('.') {
            Some(dot) => self.artifact(&format!("{}.tmp{}", &suffix[..dot], &suffix[dot..])),
            None => self.artifact(&format!("{suffix}.tmp")),
        }
    }

    /// Create the working directory if it is missing. An existing directory
    /// and its contents are left untouched.
    pub fn ensure_dir(&self) -> df_core::Result<()> {
        if !self.dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

/// Move a finished temporary file onto its artifact path.
///
/// Tries rename first (same filesystem), falling back to copy+remove.
/// Returns the destination path.
///
/// # Errors
///
/// Returns an error if `temp` does not exist or both move strategies fail.
pub fn finalize(temp: &Path, dest: &Path) -> df_core::Result<PathBuf> {
    if !temp.exists() {
        return Err(df_core::Error::tool(
            "workspace",
            format!("output file does not exist: {}", temp.display()),
        ));
    }

    if let Err(_rename_err) = std::fs::rename(temp, dest) {
        std::fs::copy(temp, dest).map_err(|e| {
            df_core::Error::tool(
                "workspace",
                format!("failed to copy output to destination: {e}"),
            )
        })?;
        let _ = std::fs::remove_file(temp);
    }

    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn artifact_keeps_dots_in_base() {
        let ws = WorkingSet::new("/out", "Dr. Who: Part 1");
        assert_eq!(ws.artifact(".srt"), Path::new("/out/Dr. Who: Part 1.srt"));
        assert_eq!(ws.artifact(".en-zh.mp4"), Path::new("/out/Dr. Who: Part 1.en-zh.mp4"));
    }

    #[test]
    fn temp_artifact_keeps_extension_last() {
        let ws = WorkingSet::new("/out", "talk");
        assert_eq!(ws.temp_artifact(".wav"), Path::new("/out/talk.tmp.wav"));
        assert_eq!(ws.temp_artifact(".en-zh.mp4"), Path::new("/out/talk.en-zh.tmp.mp4"));
        assert_eq!(ws.temp_artifact(""), Path::new("/out/talk.tmp"));
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkingSet::new(root.path().join("a/b"), "talk");
        ws.ensure_dir().unwrap();
        fs::write(ws.artifact(".srt"), "1\n").unwrap();
        ws.ensure_dir().unwrap();
        assert!(ws.exists(".srt"));
    }

    #[test]
    fn finalize_moves_temp_over_destination() {
        let dir = tempfile::tempdir().unwrap();
        let ws = WorkingSet::new(dir.path(), "talk");
        let temp = ws.temp_artifact(".wav");
        fs::write(&temp, b"resampled").unwrap();

        let dest = finalize(&temp, &ws.artifact(".wav")).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"resampled");
        assert!(!temp.exists());
    }

    #[test]
    fn finalize_fails_when_temp_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ws = WorkingSet::new(dir.path(), "talk");
        let result = finalize(&ws.temp_artifact(".wav"), &ws.artifact(".wav"));
        assert!(result.is_err());
        assert!(!ws.exists(".wav"));
    }
}
