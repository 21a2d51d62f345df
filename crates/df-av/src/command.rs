//! Builder for executing external tool commands.
//!
//! Arguments are always passed to the OS as a discrete list. Nothing goes
//! through a shell, so file names containing spaces or quotes are safe.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8). Empty unless capturing.
    pub stdout: String,
    /// Captured standard error (lossy UTF-8). Empty unless capturing.
    pub stderr: String,
}

impl ToolOutput {
    /// Standard output with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.stdout.trim()
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use df_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> df_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("yt-dlp"))
///     .arg("--get-title")
///     .arg("https://example.com/watch?v=1")
///     .capture(true)
///     .execute()
///     .await?;
/// println!("{}", output.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, OsString)>,
    timeout: Option<Duration>,
    capture: bool,
    stdin_file: Option<PathBuf>,
    stdout_file: Option<PathBuf>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            envs: Vec::new(),
            timeout: None,
            capture: false,
            stdin_file: None,
            stdout_file: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append a path argument.
    pub fn arg_path(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child only.
    pub fn env(&mut self, key: impl Into<String>, value: impl Into<OsString>) -> &mut Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Capture stdout and stderr instead of passing them through to the
    /// terminal.
    pub fn capture(&mut self, capture: bool) -> &mut Self {
        self.capture = capture;
        self
    }

    /// Feed the contents of `path` to the process's stdin.
    pub fn stdin_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.stdin_file = Some(path.into());
        self
    }

    /// Write the process's stdout to `path`.
    ///
    /// Output goes to `{path}.part` first and is renamed over `path` only
    /// when the process succeeds.
    pub fn stdout_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.stdout_file = Some(path.into());
        self
    }

    /// The program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The argument list.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// File receiving stdout, if any.
    pub fn get_stdout_file(&self) -> Option<&Path> {
        self.stdout_file.as_deref()
    }

    /// Short tool name used in errors and logs (`ffmpeg`, `yt-dlp`, ...).
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn build(&self) -> df_core::Result<Command> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);

        if let Some(ref path) = self.stdin_file {
            let file = std::fs::File::open(path).map_err(|e| {
                df_core::Error::tool(
                    self.tool_name(),
                    format!("failed to open stdin file {}: {e}", path.display()),
                )
            })?;
            cmd.stdin(Stdio::from(file));
        }

        if let Some(ref path) = self.stdout_file {
            let part = part_path(path);
            let file = std::fs::File::create(&part).map_err(|e| {
                df_core::Error::tool(
                    self.tool_name(),
                    format!("failed to create {}: {e}", part.display()),
                )
            })?;
            cmd.stdout(Stdio::from(file));
        } else if self.capture {
            cmd.stdout(Stdio::piped());
        }

        if self.capture {
            cmd.stderr(Stdio::piped());
        }

        Ok(cmd)
    }

    /// Spawn the process without waiting for it.
    ///
    /// The child is killed if the returned handle is dropped while it is
    /// still running.
    pub fn spawn(&self) -> df_core::Result<Child> {
        self.build()?.spawn().map_err(|e| {
            df_core::Error::tool(self.tool_name(), format!("failed to spawn: {e}"))
        })
    }

    /// Execute the command and wait for it to exit.
    ///
    /// # Errors
    ///
    /// - [`df_core::Error::Tool`] if spawning fails, the timeout expires, or
    ///   the process exits with a non-zero status (message includes the
    ///   command line and captured stderr).
    pub async fn execute(&self) -> df_core::Result<ToolOutput> {
        let program_name = self.tool_name();
        let child = self.spawn()?;

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    // The child was dropped with the future; kill_on_drop reaps it.
                    self.discard_part();
                    return Err(df_core::Error::tool(
                        program_name,
                        format!("`{self}` timed out after {limit:?}"),
                    ));
                }
            },
            None => child.wait_with_output().await,
        };

        let output = waited.map_err(|e| {
            self.discard_part();
            df_core::Error::tool(
                program_name.clone(),
                format!("I/O error waiting for process: {e}"),
            )
        })?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            self.discard_part();
            let stderr = tool_output.stderr.trim();
            let message = if stderr.is_empty() {
                format!("`{self}` exited with {}", output.status)
            } else {
                format!("`{self}` exited with {}: {stderr}", output.status)
            };
            return Err(df_core::Error::tool(program_name, message));
        }

        if let Some(ref path) = self.stdout_file {
            std::fs::rename(part_path(path), path)?;
        }

        Ok(tool_output)
    }

    fn discard_part(&self) {
        if let Some(ref path) = self.stdout_file {
            let _ = std::fs::remove_file(part_path(path));
        }
    }
}

/// Renders the command the way a user would type it, quoting arguments that
/// contain whitespace or quotes. For logs only; never executed.
impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool_name())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'')
            {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        if let Some(ref path) = self.stdin_file {
            write!(f, " < {:?}", path.display().to_string())?;
        }
        if let Some(ref path) = self.stdout_file {
            write!(f, " > {:?}", path.display().to_string())?;
        }
        Ok(())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captured_output_is_trimmed() {
        let out = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo '  hello  '"])
            .capture(true)
            .execute()
            .await
            .unwrap();

        assert!(out.status.success());
        assert_eq!(out.text(), "hello");
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("failed to spawn"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn nonzero_exit_reports_command_and_stderr() {
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo broken >&2; exit 3"])
            .capture(true)
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Tool error [sh]"), "unexpected error: {err}");
        assert!(err.contains("broken"), "unexpected error: {err}");
        assert!(err.contains("exit 3"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn arguments_with_spaces_stay_whole() {
        let out = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "printf '%s|' \"$@\"", "sh", "a b", "it's"])
            .capture(true)
            .execute()
            .await
            .unwrap();
        assert_eq!(out.text(), "a b|it's|");
    }

    #[tokio::test]
    async fn timeout_fires() {
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn stdout_file_appears_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.txt");
        std::fs::write(&src, "hello\n").unwrap();

        let ok = dir.path().join("ok.txt");
        ToolCommand::new(PathBuf::from("cat"))
            .stdin_file(&src)
            .stdout_file(&ok)
            .execute()
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&ok).unwrap(), "hello\n");
        assert!(!part_path(&ok).exists());

        let failed = dir.path().join("failed.txt");
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo partial; exit 1"])
            .stdout_file(&failed)
            .execute()
            .await;
        assert!(result.is_err());
        assert!(!failed.exists());
        assert!(!part_path(&failed).exists());
    }

    #[test]
    fn display_quotes_awkward_arguments() {
        let mut cmd = ToolCommand::new(PathBuf::from("/usr/bin/ffmpeg"));
        cmd.args(["-i", "My Talk.mp4", "-ar", "16000"]);
        assert_eq!(cmd.to_string(), "ffmpeg -i \"My Talk.mp4\" -ar 16000");
    }
}
