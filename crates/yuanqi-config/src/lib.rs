//! Configuration for the Yuanqi agent client.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (XDG user config + project-local overrides)
//! - `YUANQI_*` environment variable overrides
//! - Validation of the credentials the CLI needs before it sends anything

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, Layer, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir,
};
pub use error::{ConfigError, Result};
pub use types::*;
