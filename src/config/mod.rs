//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`BUTLER_API_KEY`, `BUTLER_BASE_URL`,
//!    `BUTLER_MODEL`, `BUTLER_API_TIMEOUT_SECS`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./butler.toml in the current directory
//! 4. $XDG_CONFIG_HOME/butler/butler.toml (or ~/.config/butler/butler.toml)
//! 5. Built-in defaults
//!
//! The API key falls back to `ANTHROPIC_API_KEY` when `[model]` names no key
//! source.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

mod defaults;
mod resolve;
mod types;

use defaults::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use resolve::resolve_config_from_file_config;
use types::FileConfig;
pub use types::{
    AgentConfig, ApiConfig, Config, ConnectionConfig, DesktopConfig, DisplayConfig, LoadedConfig,
    ModelConfig, ServerConfig, ServerKind,
};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<LoadedConfig, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<LoadedConfig, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (config_text, source) = read_config_text(path_override, &read_file, &config_root)?;
    let parsed: FileConfig = toml::from_str(&config_text)?;
    let mut config = resolve_config_from_file_config(
        parsed,
        env_lookup("BUTLER_API_KEY"),
        &env_lookup,
        |path| {
            read_file(Path::new(path)).map_err(|e| {
                ConfigError::Invalid(format!("failed to read model.api_key_file `{path}`: {e}"))
            })
        },
    )?;
    apply_runtime_env_overrides(&mut config, &env_lookup)?;

    Ok(LoadedConfig { config, source })
}

fn read_config_text<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, Option<PathBuf>), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, Some(path)));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if let Ok(text) = read_file(&local) {
        return Ok((text, Some(local)));
    }
    if let Some(dir) = config_root() {
        let global = global_config_path(&dir);
        if let Ok(text) = read_file(&global) {
            return Ok((text, Some(global)));
        }
    }

    Ok((String::new(), None))
}

fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = env_lookup("BUTLER_BASE_URL") {
        config.api.base_url = url.trim().to_string();
    }
    if let Some(model) = env_lookup("BUTLER_MODEL") {
        config.api.model = model.trim().to_string();
    }
    if let Some(timeout) = env_lookup("BUTLER_API_TIMEOUT_SECS") {
        let parsed = timeout.trim().parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid BUTLER_API_TIMEOUT_SECS value `{timeout}`: expected positive integer seconds"
            ))
        })?;
        config.api.timeout_secs = parsed.max(1);
    }
    Ok(())
}

/// Per-user config path under a config root (`<root>/butler/butler.toml`).
fn global_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}

fn config_root_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .or_else(dirs::config_dir)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
