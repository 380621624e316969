//! Configuration data model.
//!
//! Struct/enum definitions plus default values. Loading and precedence live
//! in `config::mod`; file-to-runtime resolution lives in `config::resolve`.

use serde::Deserialize;
use std::path::PathBuf;

use super::defaults::{
    default_connections, DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL_ID,
};

/// Top-level runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved model API settings from `[model]` plus env overrides.
    pub api: ApiConfig,
    pub agent: AgentConfig,
    pub desktop: DesktopConfig,
    pub display: DisplayConfig,
    /// Connections registered with the desktop provider at startup.
    pub connections: Vec<ConnectionConfig>,
    /// Named external tool servers selectable with `--server`.
    pub servers: Vec<ServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            agent: AgentConfig::default(),
            desktop: DesktopConfig::default(),
            display: DisplayConfig::default(),
            connections: default_connections(),
            servers: Vec::new(),
        }
    }
}

impl Config {
    /// Look up a configured tool server by name.
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|server| server.name == name)
    }
}

/// Resolved API connection settings used by the runtime HTTP client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.into(),
            api_key: String::new(),
            model: DEFAULT_MODEL_ID.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

/// Model settings stored under `[model]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(alias = "api_base_url")]
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub api_key_env: Option<String>,
    pub api_key_file: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.into(),
            model: DEFAULT_MODEL_ID.into(),
            api_key: String::new(),
            api_key_env: None,
            api_key_file: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

/// Agent behavior settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Operator instructions appended to the built-in system prompt.
    pub system_prompt: Option<String>,
    /// File whose contents replace the built-in system prompt.
    pub system_prompt_file: Option<PathBuf>,
    /// Safety cap on model round-trips per query.
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            system_prompt_file: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Remote desktop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Directory for relative screenshot paths; the working directory if unset.
    pub screenshot_dir: Option<PathBuf>,
    /// Send screenshots back to the model as image content.
    pub attach_screenshots: bool,
    pub connect_timeout_secs: u64,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: None,
            attach_screenshots: false,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Display / rendering preferences.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
    /// Echo tool call lines while a query runs.
    pub show_tool_calls: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            show_tool_calls: true,
        }
    }
}

/// A `[[connections]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub name: String,
    /// `vnc://[user[:password]@]host[:port]`
    pub uri: String,
    #[serde(default)]
    pub ssh_user: Option<String>,
    #[serde(default)]
    pub ssh_password: Option<String>,
}

/// Transport used to reach an external tool server.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    /// Child process speaking MCP JSON-RPC over stdio.
    #[default]
    Stdio,
    /// HTTP server exposing `GET /tools` and `POST /execute`.
    Http,
}

/// A `[[servers]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    #[serde(default)]
    pub kind: ServerKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct FileConfig {
    pub(super) model: ModelConfig,
    pub(super) agent: AgentConfig,
    pub(super) desktop: DesktopConfig,
    pub(super) display: DisplayConfig,
    pub(super) connections: Option<Vec<ConnectionConfig>>,
    pub(super) servers: Vec<ServerConfig>,
}

/// Configuration payload plus the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// `None` when only built-in defaults were used.
    pub source: Option<PathBuf>,
}
