mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::Cli;
use df_av::{SystemRunner, ToolRegistry};
use df_core::config::{Config, FailurePolicy};
use df_pipeline::{
    resolve, BackgroundSlot, CancellationController, ControllerState, PipelineExecutor,
    RunContext, RunInput,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tokio_util::sync::CancellationToken;

/// Conventional exit status for a run stopped by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "dubforge=debug,df_core=debug,df_av=debug,df_pipeline=debug".to_string()
        } else {
            "dubforge=info,df_core=info,df_av=info,df_pipeline=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|rt| rt.block_on(run(cli)));

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }
    if cli.fail_fast {
        config.pipeline.failure_policy = FailurePolicy::FailFast;
    }

    let tools = Arc::new(ToolRegistry::discover(&config.tools));

    if cli.check_tools {
        return check_tools(&tools, cli.json);
    }

    let Some(raw_input) = cli.input else {
        eprintln!("{}", Cli::command().render_usage());
        return Ok(ExitCode::FAILURE);
    };
    let input = RunInput::parse(&raw_input);
    tracing::info!("Processing {input}");

    let runner = Arc::new(SystemRunner);
    let token = CancellationToken::new();
    let background = BackgroundSlot::new();
    let controller = CancellationController::new(token.clone(), background.clone());
    let listener = controller.listen();

    let resolved = tokio::select! {
        resolved = resolve(&input, runner.as_ref(), &tools, &config.pipeline) => resolved,
        () = token.cancelled() => Err(df_core::Error::Cancelled),
    };
    let artifacts = match resolved {
        Ok(artifacts) => artifacts,
        Err(e) if e.is_cancelled() => return Ok(interrupted(&controller, listener).await),
        Err(e) => {
            listener.abort();
            return Err(e.into());
        }
    };

    let policy = config.pipeline.failure_policy;
    let ctx = RunContext::new(artifacts, Arc::new(config.pipeline), tools, runner)
        .with_cancellation(token)
        .with_background(background)
        .with_transcribe_args(cli.transcribe_args);
    let executor = PipelineExecutor::standard().with_policy(policy);

    if cli.dry_run {
        listener.abort();
        println!("Working directory: {}", ctx.artifacts.working_set.dir().display());
        for step in executor.plan(&ctx) {
            let action = if step.done { "skip" } else { "run" };
            println!("  {action:<4} {}", step.name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    match executor.execute(&ctx).await {
        Ok(report) => {
            listener.abort();
            for (stage, error) in report.failures() {
                tracing::warn!("{stage} did not complete: {error}");
            }
            let merged = ctx.artifacts.artifact(&ctx.config.merge.output_suffix);
            if merged.exists() {
                println!("{}", hyperlink(&merged));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_cancelled() => Ok(interrupted(&controller, listener).await),
        Err(e) => {
            listener.abort();
            Err(e.into())
        }
    }
}

/// Let the interrupt handler finish stopping the background download, then
/// report the interrupt.
async fn interrupted(
    controller: &CancellationController,
    listener: tokio::task::JoinHandle<()>,
) -> ExitCode {
    if controller.state() == ControllerState::Terminating {
        if let Err(e) = listener.await {
            tracing::debug!("Interrupt handler ended abnormally: {e}");
        }
    } else {
        listener.abort();
    }
    tracing::warn!("Cancelled");
    ExitCode::from(EXIT_INTERRUPTED)
}

/// Bytes that cannot appear literally in the path of a `file://` URI.
const URI_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// `path` as an OSC-8 terminal hyperlink to its absolute location.
fn hyperlink(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let shown = absolute.display().to_string();
    let uri = utf8_percent_encode(&shown, URI_PATH);
    format!("\x1b]8;;file://{uri}\x1b\\{shown}\x1b]8;;\x1b\\")
}

fn check_tools(tools: &ToolRegistry, json: bool) -> Result<ExitCode> {
    let infos = tools.check_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Checking external tools...\n");
    let mut all_ok = true;

    for tool in &infos {
        let status = if tool.available {
            "✓"
        } else {
            // Either transcriber is enough.
            if !matches!(tool.name.as_str(), "parakeet-mlx" | "whisper-cpp") {
                all_ok = false;
            }
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    if !tools.has("parakeet-mlx") && !tools.has("whisper-cpp") {
        all_ok = false;
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(ExitCode::SUCCESS)
}
