//! # df-av
//!
//! External tool plumbing for the dubforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to yt-dlp,
//!   ffmpeg, the transcribers, the translators, and the speech synthesizer,
//!   searching a tool-local `bin/` before `PATH`.
//! - **Command execution** ([`ToolCommand`], [`ToolRunner`]) -- async
//!   argument-list builder with capture, file redirection, and timeouts,
//!   behind a trait so the pipeline can be driven without real processes.
//! - **Background tasks** ([`BackgroundTask`]) -- one supervised process that
//!   runs alongside the pipeline and can be waited on or cancelled with a
//!   bounded grace period.
//! - **Working sets** ([`WorkingSet`]) -- artifact naming and atomic
//!   finalization of temporary files.
//! - **Argument templates** ([`TemplateContext`]).

pub mod background;
pub mod command;
pub mod runner;
pub mod template;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use background::{BackgroundTask, TaskState};
pub use command::{ToolCommand, ToolOutput};
pub use runner::{SystemRunner, ToolRunner};
pub use template::TemplateContext;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::{finalize, WorkingSet};
