//! Configuration command implementations
//!
//! Commands for inspecting Orderly configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use std::process::ExitCode;

use crate::cli::Output;
use crate::config::{ConfigLoader, OrderlyConfig};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the merged configuration
    Show {
        /// Output format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
    /// Check that the configuration parses
    Validate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

/// Execute config commands
pub fn execute(args: ConfigArgs, custom_config: Option<&str>, output: &Output) -> Result<ExitCode> {
    let loader = ConfigLoader::load_with_custom_config(custom_config)?;

    match args.command {
        ConfigCommands::Show { format } => {
            let config = loader.extract()?;
            println!("{}", render(&config, format)?);
            Ok(ExitCode::SUCCESS)
        }
        ConfigCommands::Validate => match loader.extract() {
            Ok(config) => {
                output.success("Configuration is valid");
                output.key_value("parallel.threads", &config.parallel.threads.to_string());
                output.key_value("parallel.max_threads", &config.parallel.max_threads.to_string());
                output.key_value("run.shell", &config.run.shell);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                output.error(&format!("{e:#}"));
                Ok(ExitCode::FAILURE)
            }
        },
    }
}

fn render(config: &OrderlyConfig, format: ConfigFormat) -> Result<String> {
    match format {
        ConfigFormat::Toml => toml::to_string(config).context("Failed to render configuration"),
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("Failed to render configuration")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_toml_round_trips_sections() {
        let rendered = render(&OrderlyConfig::default(), ConfigFormat::Toml).unwrap();
        assert!(rendered.contains("[parallel]"));
        assert!(rendered.contains("max_threads = 12"));
        assert!(rendered.contains("[run]"));
    }

    #[test]
    fn test_render_json() {
        let rendered = render(&OrderlyConfig::default(), ConfigFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["run"]["shell"], "sh");
    }
}
