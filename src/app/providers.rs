//! Resolve `--server` identifiers into tool providers.

use butler::config::{Config, ServerConfig, ServerKind};
use butler::desktop::rfb::RfbConnector;
use butler::desktop::ssh::SshCommandRunner;
use butler::desktop::Credentials;
use butler::tools::desktop::{DesktopProvider, DesktopSettings, DESKTOP_PROVIDER_ID};
use butler::tools::http::HttpToolProvider;
use butler::tools::mcp::McpStdioProvider;
use butler::tools::{ProviderId, ToolProvider};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MEMORY_PROVIDER_ID: &str = "memory";
const MEMORY_SERVER_COMMAND: &str = "npx";
const MEMORY_SERVER_ARGS: [&str; 2] = ["-y", "@modelcontextprotocol/server-memory"];

/// What one `--server` identifier refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProviderSpec {
    /// The in-process desktop provider.
    Desktop,
    /// A stdio MCP server started from a command line.
    Stdio {
        id: String,
        command: String,
        args: Vec<String>,
    },
    /// An HTTP tool server.
    Http { id: String, url: String },
}

impl ProviderSpec {
    pub(crate) fn id(&self) -> &str {
        match self {
            Self::Desktop => DESKTOP_PROVIDER_ID,
            Self::Stdio { id, .. } | Self::Http { id, .. } => id,
        }
    }
}

/// Map one identifier to a provider spec.
///
/// Recognized, in order: `vnc`, `memory`, a `[[servers]]` name, an
/// `http://`/`https://` URL, and a `.py` or `.js` script path.
pub(crate) fn parse_provider_spec(identifier: &str, config: &Config) -> Result<ProviderSpec, String> {
    let identifier = identifier.trim();
    if identifier == DESKTOP_PROVIDER_ID {
        return Ok(ProviderSpec::Desktop);
    }
    if identifier == MEMORY_PROVIDER_ID {
        return Ok(ProviderSpec::Stdio {
            id: MEMORY_PROVIDER_ID.to_string(),
            command: MEMORY_SERVER_COMMAND.to_string(),
            args: MEMORY_SERVER_ARGS.iter().map(|a| a.to_string()).collect(),
        });
    }
    if let Some(server) = config.server(identifier) {
        return configured_spec(server);
    }
    if identifier.starts_with("http://") || identifier.starts_with("https://") {
        return Ok(ProviderSpec::Http {
            id: url_provider_id(identifier)?,
            url: identifier.to_string(),
        });
    }

    let interpreter = if identifier.ends_with(".py") {
        "python"
    } else if identifier.ends_with(".js") {
        "node"
    } else {
        return Err(format!(
            "unknown server `{identifier}`: expected vnc, memory, a configured server name, an http(s) URL, or a .py/.js script"
        ));
    };
    Ok(ProviderSpec::Stdio {
        id: script_provider_id(identifier),
        command: interpreter.to_string(),
        args: vec![identifier.to_string()],
    })
}

fn configured_spec(server: &ServerConfig) -> Result<ProviderSpec, String> {
    match server.kind {
        ServerKind::Stdio => {
            let command = server
                .command
                .clone()
                .ok_or_else(|| format!("server `{}` has no command", server.name))?;
            Ok(ProviderSpec::Stdio {
                id: server.name.clone(),
                command,
                args: server.args.clone(),
            })
        }
        ServerKind::Http => {
            let url = server
                .url
                .clone()
                .ok_or_else(|| format!("server `{}` has no url", server.name))?;
            Ok(ProviderSpec::Http {
                id: server.name.clone(),
                url,
            })
        }
    }
}

/// File name up to the first dot: `tools/notes.server.py` -> `notes`.
fn script_provider_id(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(path)
        .to_string()
}

/// Host (and port) with separators folded to `_`: `http://tools.lan:8000` -> `tools_lan_8000`.
fn url_provider_id(url: &str) -> Result<String, String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| format!("invalid server url `{url}`: {e}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| format!("server url `{url}` has no host"))?;
    let raw = match parsed.port() {
        Some(port) => format!("{host}_{port}"),
        None => host.to_string(),
    };
    Ok(raw
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect())
}

/// Start the provider for `spec`.
pub(crate) async fn start_provider(
    spec: &ProviderSpec,
    config: &Config,
) -> Result<Arc<dyn ToolProvider>, String> {
    match spec {
        ProviderSpec::Desktop => Ok(Arc::new(start_desktop_provider(config).await)),
        ProviderSpec::Stdio { id, command, args } => {
            let provider = McpStdioProvider::spawn(ProviderId::new(id.clone()), command, args)
                .await
                .map_err(|e| format!("failed to start server `{id}`: {e}"))?;
            Ok(Arc::new(provider))
        }
        ProviderSpec::Http { id, url } => {
            info!(provider = %id, url = %url, "using http tool server");
            let timeout = Duration::from_secs(config.api.timeout_secs.max(1));
            Ok(Arc::new(HttpToolProvider::new(ProviderId::new(id.clone()), url, timeout)))
        }
    }
}

/// Desktop provider over RFB + SSH with configured connections pre-registered.
async fn start_desktop_provider(config: &Config) -> DesktopProvider {
    let connect_timeout = Duration::from_secs(config.desktop.connect_timeout_secs.max(1));
    let provider = DesktopProvider::new(
        Arc::new(RfbConnector::new(connect_timeout)),
        Arc::new(SshCommandRunner::new(connect_timeout)),
        DesktopSettings {
            screenshot_dir: config.desktop.screenshot_dir.clone(),
            attach_screenshots: config.desktop.attach_screenshots,
        },
    );
    for connection in &config.connections {
        let credentials = Credentials {
            user: connection.ssh_user.clone(),
            password: connection.ssh_password.clone(),
        };
        if let Err(err) = provider
            .register(&connection.name, &connection.uri, credentials)
            .await
        {
            warn!(connection = %connection.name, error = %err, "skipping configured connection");
        }
    }
    provider
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_servers(servers: Vec<ServerConfig>) -> Config {
        Config {
            servers,
            ..Config::default()
        }
    }

    #[test]
    fn builtin_identifiers_resolve() {
        let config = Config::default();
        assert_eq!(parse_provider_spec("vnc", &config).unwrap(), ProviderSpec::Desktop);
        let memory = parse_provider_spec("memory", &config).unwrap();
        assert_eq!(
            memory,
            ProviderSpec::Stdio {
                id: "memory".into(),
                command: "npx".into(),
                args: vec!["-y".into(), "@modelcontextprotocol/server-memory".into()],
            }
        );
    }

    #[test]
    fn scripts_pick_interpreter_and_use_stem_as_id() {
        let config = Config::default();
        let py = parse_provider_spec("servers/notes.server.py", &config).unwrap();
        assert_eq!(
            py,
            ProviderSpec::Stdio {
                id: "notes".into(),
                command: "python".into(),
                args: vec!["servers/notes.server.py".into()],
            }
        );
        let js = parse_provider_spec("weather.js", &config).unwrap();
        assert_eq!(js.id(), "weather");
        assert!(matches!(js, ProviderSpec::Stdio { command, .. } if command == "node"));
    }

    #[test]
    fn urls_become_http_providers() {
        let spec = parse_provider_spec("http://tools.lan:8000/", &Config::default()).unwrap();
        assert_eq!(
            spec,
            ProviderSpec::Http {
                id: "tools_lan_8000".into(),
                url: "http://tools.lan:8000/".into(),
            }
        );
    }

    #[test]
    fn configured_servers_take_their_name() {
        let config = config_with_servers(vec![
            ServerConfig {
                name: "files".into(),
                kind: ServerKind::Stdio,
                command: Some("uvx".into()),
                args: vec!["mcp-server-files".into()],
                url: None,
            },
            ServerConfig {
                name: "remote".into(),
                kind: ServerKind::Http,
                command: None,
                args: vec![],
                url: Some("http://10.0.0.5:8000".into()),
            },
        ]);
        assert_eq!(
            parse_provider_spec("files", &config).unwrap(),
            ProviderSpec::Stdio {
                id: "files".into(),
                command: "uvx".into(),
                args: vec!["mcp-server-files".into()],
            }
        );
        assert_eq!(
            parse_provider_spec("remote", &config).unwrap(),
            ProviderSpec::Http {
                id: "remote".into(),
                url: "http://10.0.0.5:8000".into(),
            }
        );
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = parse_provider_spec("server.rb", &Config::default()).unwrap_err();
        assert!(err.contains("unknown server `server.rb`"));
    }
}
