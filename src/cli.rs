use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dubforge")]
#[command(
    author,
    version,
    about = "Transcribe, translate and dub a video into Chinese",
    override_usage = "dubforge [OPTIONS] <video_file_or_url> [transcription options...]"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Show which stages would run without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Stop at the first failed stage
    #[arg(long)]
    pub fail_fast: bool,

    /// Check that the external tools are available
    #[arg(long)]
    pub check_tools: bool,

    /// Print the tool check as JSON
    #[arg(long, requires = "check_tools")]
    pub json: bool,

    /// Local media file, or an http(s) URL to download
    #[arg(value_name = "video_file_or_url")]
    pub input: Option<String>,

    /// Passed verbatim to the transcription tool
    #[arg(
        value_name = "transcription options",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub transcribe_args: Vec<String>,
}
