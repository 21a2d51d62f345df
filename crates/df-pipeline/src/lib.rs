//! # df-pipeline
//!
//! The dubbing pipeline: from a video locator to a video with a dubbed
//! audio track.
//!
//! This crate provides:
//!
//! - **[`resolve`]** -- maps a [`RunInput`] to its working set and
//!   [`Artifacts`].
//! - **[`Stage`]** trait -- one pipeline step that knows when its output
//!   already exists.
//! - **Built-in stages** ([`stages`]) -- acquire, preprocess, transcribe,
//!   translate, synthesize, merge.
//! - **[`PipelineExecutor`]** -- runs stages in order, skipping finished
//!   ones, and applies the failure policy.
//! - **[`CancellationController`]** -- turns SIGINT/SIGTERM into an orderly
//!   stop of the foreground and background work.

pub mod cancel;
pub mod context;
pub mod executor;
pub mod resolver;
pub mod stage;
pub mod stages;

// Re-export key types at the crate root.
pub use cancel::{CancellationController, ControllerState};
pub use context::{BackgroundSlot, ProgressSender, RunContext};
pub use executor::{PipelineExecutor, RunReport, StageOutcome, StagePlan, StageRecord};
pub use resolver::{resolve, sanitize_title, Artifacts, RunInput};
pub use stage::{Stage, StageResult};
