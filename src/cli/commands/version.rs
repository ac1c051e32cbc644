//! Version command implementation

use anyhow::Result;
use std::process::ExitCode;

use crate::{PKG_DESCRIPTION, PKG_NAME, VERSION};

/// Execute the version command
pub fn execute() -> Result<ExitCode> {
    println!("{PKG_NAME} {VERSION}");
    println!("{PKG_DESCRIPTION}");
    println!(
        "profile: {}, target: {}-{}",
        if cfg!(debug_assertions) { "debug" } else { "release" },
        std::env::consts::ARCH,
        std::env::consts::OS
    );

    Ok(ExitCode::SUCCESS)
}
