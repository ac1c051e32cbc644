use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::Output;
use crate::config::OrderlyConfig;
use crate::runner::{CommandRunner, CommandTemplate, read_items};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Worker threads to start (0 = choose automatically)
    #[arg(short = 'P', long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Read items from FILE, one per line (default: stdin)
    #[arg(short, long, value_name = "FILE", conflicts_with = "items")]
    pub input: Option<PathBuf>,

    /// Item to process (can be repeated)
    #[arg(long = "item", value_name = "ITEM")]
    pub items: Vec<String>,

    /// Trace session lifecycle events
    #[arg(short = 'x', long)]
    pub trace: bool,

    /// Command template; `{}` is replaced by the item, `{#}` by its index
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

pub fn execute(
    args: RunArgs,
    mut config: OrderlyConfig,
    verbose: u8,
    output: &Output,
) -> Result<ExitCode> {
    if let Some(threads) = args.threads {
        config.parallel.threads = threads;
    }
    config.session.trace |= args.trace;
    config.session.verbose |= verbose > 0;

    let items = if !args.items.is_empty() {
        args.items
    } else if let Some(path) = &args.input {
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;
        read_items(BufReader::new(file))?
    } else {
        read_items(io::stdin().lock())?
    };

    let template = CommandTemplate::new(&args.command, &config.run)?;
    let runner = CommandRunner::new(template, items);
    let dispatcher = config.dispatcher();

    if runner.is_empty() {
        output.verbose("No items to process");
    } else {
        output.verbose(&format!(
            "Processing {} items on {} threads",
            runner.len(),
            dispatcher.thread_count(runner.len())
        ));
    }

    let report = dispatcher.run(runner.len(), io::stdout(), |session, index, buf| {
        runner.run_item(session, index, buf)
    })?;

    if report.is_success() {
        output.verbose(&format!("Completed {} items", report.items));
        Ok(ExitCode::SUCCESS)
    } else {
        output.error(&format!(
            "{} of {} worker threads reported failures",
            report.failed_threads + report.join_failures,
            report.threads
        ));
        Ok(ExitCode::FAILURE)
    }
}
