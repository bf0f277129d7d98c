//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/yuanqi/config.toml` (XDG user config)
//! 2. `./yuanqi.toml` (project-local)
//! 3. `YUANQI_*` environment variables
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, YuanqiConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "yuanqi.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "yuanqi";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "YUANQI_CONFIG_DIR";

/// Which file layer a [`ConfigSource`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Per-user `config.toml`.
    User,
    /// `yuanqi.toml` in the project directory.
    Project,
}

impl Layer {
    /// Short name for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::User => "user",
            Layer::Project => "project",
        }
    }
}

/// One config file that was looked for.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Which layer the file belongs to.
    pub layer: Layer,
    /// Where it was looked for.
    pub path: PathBuf,
    /// Found, parsed and merged.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: YuanqiConfig,
    /// Files looked for, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Problems worth telling the user about: unreadable files, a token in
    /// the project file.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the files that contributed to `config`.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration from the default locations and the process environment.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None, |var| std::env::var(var).ok())
}

/// Load configuration with explicit control over the user config directory
/// and the environment.
///
/// `config_dir` overrides both `YUANQI_CONFIG_DIR` and the platform default.
pub fn load_config_with_options<F>(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: F,
) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = YuanqiConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_dir = config_dir.map(Path::to_path_buf).or_else(xdg_config_dir);
    if let Some(dir) = user_dir {
        let path = dir.join(USER_CONFIG_FILE);
        sources.push(load_layer(&mut config, Layer::User, path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, Layer::Project, project_path, &mut warnings));

    config.apply_env_with(env)?;

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<YuanqiConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    YuanqiConfig::from_toml(&contents)
}

/// Directory holding the user `config.toml`.
///
/// `YUANQI_CONFIG_DIR` when set, otherwise `yuanqi` under the platform config
/// directory (`~/.config` on Linux, `~/Library/Application Support` on macOS).
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Merge the file at `path` into `config` if it exists.
///
/// A missing file is skipped silently; a broken one becomes a warning and
/// contributes nothing.
fn load_layer(
    config: &mut YuanqiConfig,
    layer: Layer,
    path: PathBuf,
    warnings: &mut Vec<String>,
) -> ConfigSource {
    let loaded = path.is_file()
        && match load_config_file(&path) {
            Ok(file) => {
                if layer == Layer::Project && file.token.is_some() {
                    warnings.push(format!(
                        "{} contains an API token. Consider {} instead, \
                         so the token is not committed with the project.",
                        path.display(),
                        crate::ENV_TOKEN
                    ));
                }
                config.merge(file);
                true
            }
            Err(e) => {
                warnings.push(format!("Failed to load {}: {}", path.display(), e));
                false
            }
        };
    ConfigSource {
        layer,
        path,
        loaded,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
