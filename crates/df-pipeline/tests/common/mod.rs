//! A scripted [`ToolRunner`] that records every command and writes the files
//! the real tools would write.

#![allow(dead_code)]

use std::collections::HashSet;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use df_av::{BackgroundTask, TaskState, ToolCommand, ToolOutput, ToolRegistry, ToolRunner};
use df_core::config::PipelineConfig;
use df_pipeline::{Artifacts, RunContext};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub tool: String,
    pub args: Vec<String>,
    pub background: bool,
}

#[derive(Debug, Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    pub title: String,
    pub filename: String,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            title: "Demo Talk".into(),
            filename: "Demo Talk [abc123].webm".into(),
            ..Self::default()
        })
    }

    pub fn with_title(title: &str, filename: &str) -> Arc<Self> {
        Arc::new(Self {
            title: title.into(),
            filename: filename.into(),
            ..Self::default()
        })
    }

    /// Make every later invocation of `tool` fail.
    pub fn fail(&self, tool: &str) {
        self.failing.lock().insert(tool.to_string());
    }

    pub fn heal(&self, tool: &str) {
        self.failing.lock().remove(tool);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn tools_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.tool.clone()).collect()
    }

    pub fn count(&self, tool: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.tool == tool).count()
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, cmd: &ToolCommand, background: bool) -> df_core::Result<String> {
        let tool = cmd.tool_name();
        self.calls.lock().push(Call {
            tool: tool.clone(),
            args: cmd.get_args().to_vec(),
            background,
        });
        if self.failing.lock().contains(&tool) {
            return Err(df_core::Error::tool(&tool, format!("`{cmd}` exited with 1")));
        }
        Ok(tool)
    }

    fn simulate(&self, tool: &str, cmd: &ToolCommand) -> String {
        let args = cmd.get_args();
        match tool {
            "yt-dlp" if has(args, "--get-title") => return format!("{}\n", self.title),
            "yt-dlp" if has(args, "--get-filename") => return format!("{}\n", self.filename),
            "yt-dlp" => touch(after(args, "-o")),
            "ffmpeg" => touch(args.last()),
            "parakeet-mlx" => {
                let dir = PathBuf::from(after(args, "--output-dir").unwrap_or(&String::new()));
                let base = after(args, "--output-template").cloned().unwrap_or_default();
                touch(Some(&dir.join(format!("{base}.srt"))));
                touch(Some(&dir.join(format!("{base}.txt"))));
            }
            "whisper-cpp" => {
                let base = after(args, "-of").cloned().unwrap_or_default();
                touch(Some(&format!("{base}.srt")));
                touch(Some(&format!("{base}.txt")));
            }
            "translate" => touch(cmd.get_stdout_file()),
            "subtitle-translate" => touch(after(args, "-o")),
            "edge-srt-to-speech" => touch(args.last()),
            _ => {}
        }
        String::new()
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, cmd: &ToolCommand) -> df_core::Result<ToolOutput> {
        let tool = self.record(cmd, false)?;
        let stdout = self.simulate(&tool, cmd);
        Ok(ToolOutput {
            status: ExitStatus::from_raw(0),
            stdout,
            stderr: String::new(),
        })
    }

    fn spawn(
        &self,
        cmd: &ToolCommand,
        _token: CancellationToken,
        _grace: Duration,
    ) -> df_core::Result<BackgroundTask> {
        let tool = self.record(cmd, true)?;
        self.simulate(&tool, cmd);
        Ok(BackgroundTask::completed(
            tool,
            TaskState::Finished {
                success: true,
                code: Some(0),
            },
        ))
    }
}

fn has(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn after<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1)
}

fn touch(path: Option<impl AsRef<Path>>) {
    if let Some(path) = path {
        std::fs::write(path.as_ref(), b"fake").unwrap();
    }
}

/// A registry where every tool lives under `/fake/bin`.
pub fn registry(with_parakeet: bool) -> Arc<ToolRegistry> {
    let mut tools = ToolRegistry::default();
    for name in df_av::tools::KNOWN_TOOLS {
        if *name == "parakeet-mlx" && !with_parakeet {
            continue;
        }
        tools.insert(name, format!("/fake/bin/{name}"));
    }
    Arc::new(tools)
}

pub fn config(work_root: &Path) -> PipelineConfig {
    PipelineConfig {
        work_root: work_root.to_string_lossy().into_owned(),
        fix_file: Some(PathBuf::from("/opt/dubforge/config/fix.csv")),
        ..PipelineConfig::default()
    }
}

pub fn context(artifacts: Artifacts, config: PipelineConfig, runner: Arc<FakeRunner>) -> RunContext {
    RunContext::new(artifacts, Arc::new(config), registry(false), runner)
}

/// Create the named artifacts with placeholder content.
pub fn seed(artifacts: &Artifacts, suffixes: &[&str]) {
    for suffix in suffixes {
        std::fs::write(artifacts.artifact(suffix), b"existing").unwrap();
    }
}
