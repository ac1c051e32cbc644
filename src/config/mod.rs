//! Configuration management for Orderly
//!
//! Settings are layered with figment (see [`ConfigLoader`]) and extracted into
//! the typed [`OrderlyConfig`].

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::parallel::{Dispatcher, SessionSettings};
use crate::utils::deserialize_flexible_bool;

pub mod core;

pub use self::core::ConfigLoader;

/// Main configuration structure for Orderly
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct OrderlyConfig {
    /// Thread pool sizing
    pub parallel: ParallelConfig,

    /// Settings copied into every per-item session
    pub session: SessionConfig,

    /// Command runner settings
    pub run: RunConfig,
}

/// Thread pool sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParallelConfig {
    /// Worker threads to start (0 = auto)
    pub threads: usize,

    /// Cap on the automatically chosen thread count
    pub max_threads: usize,

    /// Memory assumed per worker for the automatic estimate (MiB)
    pub memory_per_thread_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(deserialize_with = "deserialize_flexible_bool")]
    pub trace: bool,

    #[serde(deserialize_with = "deserialize_flexible_bool")]
    pub verbose: bool,
}

/// Command runner settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Shell used to run command templates (`<shell> -c <command>`)
    pub shell: String,

    /// Text replaced by the item in command templates
    pub placeholder: String,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            max_threads: crate::parallel::MAX_THREADS,
            memory_per_thread_mb: crate::parallel::MEMORY_PER_THREAD_MB,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            placeholder: "{}".to_string(),
        }
    }
}

impl OrderlyConfig {
    /// Load the layered configuration, optionally from a custom file.
    pub fn load(custom_config: Option<&str>) -> Result<Self> {
        ConfigLoader::load_with_custom_config(custom_config)?.extract()
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            trace: self.session.trace,
            verbose: self.session.verbose,
        }
    }

    /// Build a dispatcher from these settings.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new()
            .with_threads(self.parallel.threads)
            .with_max_threads(self.parallel.max_threads)
            .with_memory_per_thread_mb(self.parallel.memory_per_thread_mb)
            .with_settings(self.session_settings())
    }
}
