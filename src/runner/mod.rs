//! Shell command runner
//!
//! Turns a command template plus a list of items into the work function that
//! the dispatcher calls for every item.

use anyhow::{Context, Result, bail};
use std::io::{BufRead, Write};
use std::process::{Command, Stdio};

use crate::config::RunConfig;
use crate::parallel::Session;
use crate::utils::exit_status_to_string;

/// Replaced by the zero-based item index in command templates.
pub const INDEX_PLACEHOLDER: &str = "{#}";

/// A command line with placeholders for the item and its index.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    shell: String,
    placeholder: String,
    template: String,
}

impl CommandTemplate {
    pub fn new(parts: &[String], run: &RunConfig) -> Result<Self> {
        if parts.is_empty() {
            bail!("No command given");
        }
        if run.placeholder.is_empty() {
            bail!("run.placeholder must not be empty");
        }

        Ok(Self {
            shell: run.shell.clone(),
            placeholder: run.placeholder.clone(),
            template: parts.join(" "),
        })
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Build the shell command line for `item`.
    ///
    /// The item is shell-quoted. If the template contains neither placeholder
    /// the item is appended as a final argument.
    pub fn render(&self, item: &str, index: usize) -> String {
        let quoted = shell_quote(item);
        let has_item = self.template.contains(&self.placeholder);
        let has_index = self.template.contains(INDEX_PLACEHOLDER);

        let mut command = self
            .template
            .replace(INDEX_PLACEHOLDER, &index.to_string())
            .replace(&self.placeholder, &quoted);

        if !has_item && !has_index {
            command.push(' ');
            command.push_str(&quoted);
        }
        command
    }
}

/// Runs one shell command per item and captures its standard output.
#[derive(Debug)]
pub struct CommandRunner {
    template: CommandTemplate,
    items: Vec<String>,
}

impl CommandRunner {
    pub fn new(template: CommandTemplate, items: Vec<String>) -> Self {
        Self { template, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Work function for [`crate::parallel::Dispatcher::run`].
    ///
    /// The child's stdout goes to `out`, its stderr is inherited. A non-zero
    /// exit status is an error after the captured output has been written.
    pub fn run_item(&self, session: &mut Session, index: usize, out: &mut dyn Write) -> Result<()> {
        let item = self
            .items
            .get(index)
            .with_context(|| format!("No item at index {index}"))?;
        let command_line = self.template.render(item, index);

        if session.verbose() {
            tracing::info!("running: {command_line}");
        } else {
            tracing::debug!("running: {command_line}");
        }

        let output = Command::new(self.template.shell())
            .arg("-c")
            .arg(&command_line)
            .env("ORDERLY_SESSION_ID", session.identifier())
            .env("ORDERLY_INDEX", index.to_string())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to start {}", self.template.shell()))?;

        out.write_all(&output.stdout)?;

        if !output.status.success() {
            bail!(
                "item {:?}: {}",
                item,
                exit_status_to_string(output.status, self.template.shell())
            );
        }

        if session.trace() {
            tracing::trace!("{}", exit_status_to_string(output.status, self.template.shell()));
        }
        Ok(())
    }
}

/// Read one item per line, skipping blank lines.
pub fn read_items(reader: impl BufRead) -> Result<Vec<String>> {
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read items")?;
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            items.push(line.to_string());
        }
    }
    Ok(items)
}

/// Quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    let is_plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if is_plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
