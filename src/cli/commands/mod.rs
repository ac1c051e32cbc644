//! Command implementations for the Orderly CLI
//!
//! Each command is organized into its own module.

pub mod config;
pub mod estimate;
pub mod run;
pub mod version;
