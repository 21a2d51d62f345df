//! df-core: shared error type and configuration.
//!
//! This crate is the foundational dependency for all other df-* crates,
//! providing the unified [`Error`] and the [`config::Config`] tree loaded
//! from TOML.

pub mod config;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
