//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment variable held an unusable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },

    /// Required credentials are not set anywhere.
    #[error(
        "missing required settings: {}. Set them in config.toml or via {}",
        .fields.join(", "),
        .env_vars.join(", ")
    )]
    Missing {
        fields: Vec<&'static str>,
        env_vars: Vec<&'static str>,
    },
}
