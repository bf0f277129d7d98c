//! CLI command handlers.

pub mod ask;
pub mod config;

use yuanqi_config::{LoadedConfig, YuanqiConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved configuration, including command-line overrides.
    pub loaded: LoadedConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// The merged configuration.
    pub fn config(&self) -> &YuanqiConfig {
        &self.loaded.config
    }
}
