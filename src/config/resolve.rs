//! Config-file to runtime-config resolution.

use std::collections::HashSet;

use crate::error::ConfigError;

use super::defaults::{default_connections, DEFAULT_API_BASE_URL, DEFAULT_API_KEY_ENV};
use super::{ApiConfig, Config, FileConfig, ModelConfig, ServerConfig, ServerKind};

pub(super) fn resolve_config_from_file_config<FEnv, FRead>(
    parsed: FileConfig,
    key_override: Option<String>,
    env_lookup: FEnv,
    read_file: FRead,
) -> Result<Config, ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
    FRead: Fn(&str) -> Result<String, ConfigError>,
{
    let api = resolve_api_with(&parsed.model, key_override, env_lookup, read_file)?;

    let connections = parsed.connections.unwrap_or_else(default_connections);
    let mut seen = HashSet::new();
    for connection in &connections {
        let name = connection.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid(
                "connections entries need a non-empty `name`".to_string(),
            ));
        }
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::Invalid(format!(
                "connection `{name}` is defined more than once"
            )));
        }
    }

    let mut seen = HashSet::new();
    for server in &parsed.servers {
        validate_server(server)?;
        if !seen.insert(server.name.trim().to_string()) {
            return Err(ConfigError::Invalid(format!(
                "server `{}` is defined more than once",
                server.name.trim()
            )));
        }
    }

    if parsed.agent.max_iterations == 0 {
        return Err(ConfigError::Invalid(
            "agent.max_iterations must be at least 1".to_string(),
        ));
    }

    Ok(Config {
        api,
        agent: parsed.agent,
        desktop: parsed.desktop,
        display: parsed.display,
        connections,
        servers: parsed.servers,
    })
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    let name = server.name.trim();
    if name.is_empty() {
        return Err(ConfigError::Invalid(
            "servers entries need a non-empty `name`".to_string(),
        ));
    }
    match server.kind {
        ServerKind::Stdio if normalized_option(&server.command).is_none() => {
            Err(ConfigError::Invalid(format!(
                "servers.{name}: stdio servers need a `command`"
            )))
        }
        ServerKind::Http if normalized_option(&server.url).is_none() => Err(
            ConfigError::Invalid(format!("servers.{name}: http servers need a `url`")),
        ),
        _ => Ok(()),
    }
}

pub(super) fn resolve_api_with<FEnv, FRead>(
    model: &ModelConfig,
    key_override: Option<String>,
    env_lookup: FEnv,
    read_file: FRead,
) -> Result<ApiConfig, ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
    FRead: Fn(&str) -> Result<String, ConfigError>,
{
    let api_key = resolve_api_key(model, key_override, env_lookup, read_file)?;
    let base_url =
        normalized_string(&model.base_url).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    if model.max_tokens == 0 {
        return Err(ConfigError::Invalid(
            "model.max_tokens must be at least 1".to_string(),
        ));
    }

    Ok(ApiConfig {
        base_url,
        api_key,
        model: model.model.trim().to_string(),
        max_tokens: model.max_tokens,
        temperature: model.temperature,
        timeout_secs: model.timeout_secs.max(1),
    })
}

pub(super) fn resolve_api_key<FEnv, FRead>(
    model: &ModelConfig,
    key_override: Option<String>,
    env_lookup: FEnv,
    read_file: FRead,
) -> Result<String, ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
    FRead: Fn(&str) -> Result<String, ConfigError>,
{
    validate_api_key_sources(model)?;

    if let Some(key) = key_override {
        return Ok(key.trim().to_string());
    }

    if let Some(env_name) = normalized_option(&model.api_key_env) {
        return Ok(env_lookup(&env_name).unwrap_or_default().trim().to_string());
    }

    if let Some(path) = normalized_option(&model.api_key_file) {
        return Ok(read_file(&path)?.trim_end().to_string());
    }

    if let Some(key) = normalized_string(&model.api_key) {
        return Ok(key);
    }

    Ok(env_lookup(DEFAULT_API_KEY_ENV)
        .unwrap_or_default()
        .trim()
        .to_string())
}

fn validate_api_key_sources(model: &ModelConfig) -> Result<(), ConfigError> {
    let mut configured = Vec::new();
    if normalized_string(&model.api_key).is_some() {
        configured.push("api_key");
    }
    if normalized_option(&model.api_key_env).is_some() {
        configured.push("api_key_env");
    }
    if normalized_option(&model.api_key_file).is_some() {
        configured.push("api_key_file");
    }
    if configured.len() > 1 {
        return Err(ConfigError::Invalid(format!(
            "only one of model.api_key, model.api_key_env, and model.api_key_file may be set (found: {})",
            configured.join(", ")
        )));
    }
    Ok(())
}

pub(super) fn normalized_option(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(normalized_string)
}

pub(super) fn normalized_string(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
