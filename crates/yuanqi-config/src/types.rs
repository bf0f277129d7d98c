//! Configuration types.
//!
//! ```toml
//! assistant_id = "e8Fq0Rx1"
//! user_id = "user-42"
//! token = "..."
//! timeout = 60
//! chat_type = "published"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Environment variable for the assistant id.
pub const ENV_ASSISTANT_ID: &str = "YUANQI_ASSISTANT_ID";
/// Environment variable for the user id.
pub const ENV_USER_ID: &str = "YUANQI_USER_ID";
/// Environment variable for the API token.
pub const ENV_TOKEN: &str = "YUANQI_TOKEN";
/// Environment variable for the assistant version.
pub const ENV_VERSION: &str = "YUANQI_VERSION";
/// Environment variable for the request timeout, in seconds.
pub const ENV_TIMEOUT: &str = "YUANQI_TIMEOUT";
/// Environment variable for the chat type.
pub const ENV_CHAT_TYPE: &str = "YUANQI_CHAT_TYPE";
/// Environment variable for the endpoint override.
pub const ENV_ENDPOINT: &str = "YUANQI_ENDPOINT";

/// Settings needed to talk to an assistant.
///
/// Every field is optional so that layers (files, environment, flags) can be
/// merged; [`YuanqiConfig::validate`] checks the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YuanqiConfig {
    /// Assistant id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,

    /// Caller-side user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// API token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Assistant version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Request timeout in seconds. Zero disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// `published` or `preview`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_type: Option<String>,

    /// Endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl YuanqiConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: YuanqiConfig) {
        let YuanqiConfig {
            assistant_id,
            user_id,
            token,
            version,
            timeout,
            chat_type,
            endpoint,
        } = other;

        if assistant_id.is_some() {
            self.assistant_id = assistant_id;
        }
        if user_id.is_some() {
            self.user_id = user_id;
        }
        if token.is_some() {
            self.token = token;
        }
        if version.is_some() {
            self.version = version;
        }
        if timeout.is_some() {
            self.timeout = timeout;
        }
        if chat_type.is_some() {
            self.chat_type = chat_type;
        }
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
    }

    /// Overlay `YUANQI_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|var| std::env::var(var).ok())
    }

    /// Overlay `YUANQI_*` variables read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let timeout = match get(ENV_TIMEOUT) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidEnv {
                var: ENV_TIMEOUT.to_string(),
                reason: format!("expected whole seconds, got '{}' ({})", raw, e),
            })?),
            None => None,
        };

        self.merge(YuanqiConfig {
            assistant_id: get(ENV_ASSISTANT_ID),
            user_id: get(ENV_USER_ID),
            token: get(ENV_TOKEN),
            version: get(ENV_VERSION),
            timeout,
            chat_type: get(ENV_CHAT_TYPE),
            endpoint: get(ENV_ENDPOINT),
        });
        Ok(())
    }

    /// Request timeout, if one is configured and non-zero.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|s| *s > 0).map(Duration::from_secs)
    }

    /// Check that assistant id, user id and token are all set.
    pub fn validate(&self) -> Result<()> {
        let mut fields = Vec::new();
        let mut env_vars = Vec::new();

        for (value, field, var) in [
            (&self.assistant_id, "assistant_id", ENV_ASSISTANT_ID),
            (&self.user_id, "user_id", ENV_USER_ID),
            (&self.token, "token", ENV_TOKEN),
        ] {
            if value.as_deref().is_none_or(str::is_empty) {
                fields.push(field);
                env_vars.push(var);
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing { fields, env_vars })
        }
    }

    /// The token with all but its last four characters hidden.
    pub fn masked_token(&self) -> Option<String> {
        self.token.as_deref().map(|token| {
            let chars: Vec<char> = token.chars().collect();
            if chars.len() <= 4 {
                "****".to_string()
            } else {
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("****{}", tail)
            }
        })
    }
}
