//! Binary-local application orchestration.
//!
//! `main.rs` parses arguments and sets up logging; this module builds the
//! [`AppContext`] (model client, tool providers, agent) and runs task or
//! interactive mode against it.

pub(crate) mod entry;
pub(crate) mod exec_mode;
pub(crate) mod providers;
pub(crate) mod repl_loop;

use crate::cli::Args;
use butler::agent::{Agent, AgentSettings};
use butler::api::ApiClient;
use butler::config::{AgentConfig, Config};
use butler::prompt::SystemPrompt;
use butler::render::{RenderSink, Renderer};
use butler::tools::catalog::ToolCatalog;
use providers::{parse_provider_spec, start_provider};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Everything a run needs, built once in `main` and torn down at exit.
pub(crate) struct AppContext {
    pub(crate) agent: Agent,
    pub(crate) renderer: Arc<Renderer>,
}

impl AppContext {
    /// Start every requested provider and assemble the agent.
    ///
    /// All identifiers are validated before any provider starts; a provider
    /// that fails to start aborts the build after shutting down the ones
    /// already running.
    pub(crate) async fn build(
        config: &Config,
        args: &Args,
        renderer: Arc<Renderer>,
    ) -> Result<Self, String> {
        let system_prompt = resolve_system_prompt(args, &config.agent, |path| {
            std::fs::read_to_string(path)
        })?;

        let mut specs = Vec::new();
        let mut seen = HashSet::new();
        for identifier in &args.servers {
            let spec = parse_provider_spec(identifier, config)?;
            if !seen.insert(spec.id().to_string()) {
                warn!(provider = spec.id(), "server listed more than once; ignoring repeat");
                continue;
            }
            specs.push(spec);
        }

        let mut catalog = ToolCatalog::new();
        for spec in &specs {
            match start_provider(spec, config).await {
                Ok(provider) => {
                    catalog.add_provider(provider);
                    renderer.activity(&format!("connected to {} server", spec.id()));
                }
                Err(err) => {
                    catalog.shutdown().await;
                    return Err(err);
                }
            }
        }

        let client = ApiClient::new(
            &config.api,
            Duration::from_secs(config.api.timeout_secs.max(1)),
        );
        let settings = AgentSettings::from_config(config, system_prompt.render());
        let mut agent = Agent::new(Box::new(client), catalog, settings);
        if config.display.show_tool_calls {
            agent = agent.with_renderer(renderer.clone());
        }

        Ok(Self { agent, renderer })
    }

    /// Disconnect desktop sessions and stop child servers.
    pub(crate) async fn shutdown(&self) {
        self.agent.shutdown().await;
    }
}

/// Pick the system prompt for this run.
///
/// Precedence: `--no-system-prompt`, `--system-prompt-file`,
/// `--system-prompt`, then `[agent] system_prompt_file` (replaces the
/// built-in prompt) and `[agent] system_prompt` (appended to it).
pub(crate) fn resolve_system_prompt(
    args: &Args,
    agent: &AgentConfig,
    read_file: impl Fn(&Path) -> std::io::Result<String>,
) -> Result<SystemPrompt, String> {
    if args.no_system_prompt {
        return Ok(SystemPrompt::Disabled);
    }
    let read = |path: &Path| {
        read_file(path)
            .map_err(|e| format!("failed to read system prompt file {}: {e}", path.display()))
    };
    if let Some(path) = &args.system_prompt_file {
        return Ok(SystemPrompt::Custom(read(Path::new(path))?));
    }
    if let Some(text) = &args.system_prompt {
        return Ok(SystemPrompt::Custom(text.clone()));
    }
    if let Some(path) = &agent.system_prompt_file {
        return Ok(SystemPrompt::Custom(read(path.as_path())?));
    }
    Ok(match agent.system_prompt.as_deref().map(str::trim) {
        Some(extra) if !extra.is_empty() => SystemPrompt::BuiltInWith(extra.to_string()),
        _ => SystemPrompt::BuiltIn,
    })
}
