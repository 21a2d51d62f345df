//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the external
//! CLI tools the pipeline drives (yt-dlp, ffmpeg, parakeet-mlx, whisper-cpp,
//! translate, subtitle-translate, edge-srt-to-speech) and hands out
//! [`ToolCommand`]s pre-configured with the resolved path and search `PATH`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

/// Known tool names that the registry manages.
pub const KNOWN_TOOLS: &[&str] = &[
    "yt-dlp",
    "ffmpeg",
    "parakeet-mlx",
    "whisper-cpp",
    "translate",
    "subtitle-translate",
    "edge-srt-to-speech",
];

/// Configuration for a single external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of the version output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
    search_path: Option<OsString>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    /// Discover tools using overrides from config, then the tool-local bin
    /// directory, then `PATH`.
    ///
    /// For each known tool, if the [`df_core::config::ToolsConfig`] supplies a
    /// custom path **and** that path exists, it is used directly. Otherwise
    /// the extended search path is scanned. Tools that are not found are
    /// silently omitted from the registry.
    pub fn discover(tools_config: &df_core::config::ToolsConfig) -> Self {
        let bin_dir = tools_config.bin_dir.clone().or_else(default_bin_dir);
        let search_path = extended_path(bin_dir.as_deref());
        let cwd = std::env::current_dir().unwrap_or_default();

        let mut tools = HashMap::new();
        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "yt-dlp" => tools_config.yt_dlp_path.as_deref(),
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "parakeet-mlx" => tools_config.parakeet_path.as_deref(),
                "whisper-cpp" => tools_config.whisper_path.as_deref(),
                "translate" => tools_config.translate_path.as_deref(),
                "subtitle-translate" => tools_config.subtitle_translate_path.as_deref(),
                "edge-srt-to-speech" => tools_config.tts_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!("Configured path for {name} does not exist: {}", p.display());
                    which::which_in(name, search_path.as_ref(), &cwd).ok()
                }
                None => which::which_in(name, search_path.as_ref(), &cwd).ok(),
            };

            if let Some(path) = resolved {
                tracing::debug!("Found {name} at {}", path.display());
                tools.insert(
                    name.to_string(),
                    ToolConfig {
                        name: name.to_string(),
                        path,
                    },
                );
            }
        }

        Self {
            tools,
            search_path,
            timeout: tools_config.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Register (or replace) a tool at an explicit path.
    pub fn insert(&mut self, name: &str, path: impl Into<PathBuf>) {
        self.tools.insert(
            name.to_string(),
            ToolConfig {
                name: name.to_string(),
                path: path.into(),
            },
        );
    }

    /// Return a reference to the [`ToolConfig`] for the given tool, or an
    /// [`df_core::Error::Tool`] if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> df_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            df_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Whether the tool was found.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// A command for `name` with the resolved path, the extended `PATH`, and
    /// the configured timeout applied.
    pub fn command(&self, name: &str) -> df_core::Result<ToolCommand> {
        let tool = self.require(name)?;
        let mut cmd = ToolCommand::new(tool.path.clone());
        if let Some(ref path) = self.search_path {
            cmd.env("PATH", path.clone());
        }
        if let Some(limit) = self.timeout {
            cmd.timeout(limit);
        }
        Ok(cmd)
    }

    /// Like [`command`](Self::command) but without the timeout, for
    /// processes that run alongside the pipeline.
    pub fn background_command(&self, name: &str) -> df_core::Result<ToolCommand> {
        let tool = self.require(name)?;
        let mut cmd = ToolCommand::new(tool.path.clone());
        if let Some(ref path) = self.search_path {
            cmd.env("PATH", path.clone());
        }
        Ok(cmd)
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| {
                if let Some(cfg) = self.tools.get(name) {
                    ToolInfo {
                        name: name.to_string(),
                        available: true,
                        version: detect_version(name, &cfg.path),
                        path: Some(cfg.path.clone()),
                    }
                } else {
                    ToolInfo {
                        name: name.to_string(),
                        available: false,
                        version: None,
                        path: None,
                    }
                }
            })
            .collect()
    }
}

/// `bin/` next to the running executable.
fn default_bin_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("bin"))
}

/// `bin_dir` prepended to the inherited `PATH`.
fn extended_path(bin_dir: Option<&Path>) -> Option<OsString> {
    let inherited = std::env::var_os("PATH");
    let mut dirs: Vec<PathBuf> = bin_dir.map(Path::to_path_buf).into_iter().collect();
    if let Some(ref path) = inherited {
        dirs.extend(std::env::split_paths(path));
    }
    match std::env::join_paths(dirs) {
        Ok(joined) => Some(joined),
        Err(e) => {
            tracing::warn!("Cannot extend PATH: {e}");
            inherited
        }
    }
}

/// Run the tool's version flag and return the first line of stdout.
fn detect_version(name: &str, path: &Path) -> Option<String> {
    let version_arg = match name {
        "ffmpeg" => "-version",
        _ => "--version",
    };

    let output = std::process::Command::new(path)
        .arg(version_arg)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
