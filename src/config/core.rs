use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use std::path::Path;

use super::OrderlyConfig;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Layered configuration source.
///
/// Priority, lowest first: embedded defaults, user config, project config
/// (or a single custom file instead of both), `ORDERLY_` environment variables.
pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    pub fn load_with_custom_config(custom_config: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(custom_path) = custom_config {
            let path = Path::new(custom_path);
            if !path.is_file() {
                bail!("Config file not found: {custom_path}");
            }
            figment = merge_file(figment, path);
        } else {
            let user_dir = Self::user_config_dir();
            for name in ["config.toml", "config.json", "config.yaml", "config.yml"] {
                figment = merge_file(figment, &Path::new(&user_dir).join(name));
            }
            for name in ["orderly.toml", "orderly.json", "orderly.yaml", "orderly.yml"] {
                figment = merge_file(figment, Path::new(name));
            }
        }

        // Environment variables always have highest priority
        figment = figment.merge(Env::prefixed("ORDERLY_").split("__"));

        Ok(Self { figment })
    }

    /// Wrap an already assembled figment.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Extract the typed configuration.
    pub fn extract(&self) -> Result<OrderlyConfig> {
        self.figment
            .extract()
            .context("Failed to parse configuration")
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        Ok(self.figment.extract()?)
    }

    /// Get a nested object/section as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        Ok(self.figment.extract_inner(path)?)
    }

    fn user_config_dir() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/orderly"),
            Err(_) => "~/.config/orderly".to_string(),
        }
    }
}

/// Merge `path` using the provider that matches its extension. Missing files
/// contribute nothing.
fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => figment.merge(Json::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}
