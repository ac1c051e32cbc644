//! Estimate command implementation
//!
//! Prints the thread count `run` would choose when `--threads` is not given.

use anyhow::Result;
use std::process::ExitCode;

use crate::cli::Output;
use crate::config::OrderlyConfig;
use crate::parallel::estimate;

pub fn execute(config: &OrderlyConfig, output: &Output) -> Result<ExitCode> {
    let estimated = estimate::estimate_with_budget(config.parallel.memory_per_thread_mb);
    let automatic = estimate::effective_threads(usize::MAX, 0, config.parallel.max_threads, || estimated);

    output.verbose(&format!(
        "Assuming {} MiB per worker",
        config.parallel.memory_per_thread_mb
    ));

    println!("estimate = {estimated}");
    println!("max_threads = {}", config.parallel.max_threads);
    println!("threads = {automatic}");

    if config.parallel.threads > 0 {
        output.info(&format!(
            "parallel.threads = {} overrides the automatic choice",
            config.parallel.threads
        ));
    }

    Ok(ExitCode::SUCCESS)
}
