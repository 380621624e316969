//! Butler: a Claude agent that operates remote desktops.
//!
//! The crate wires a tool-use conversation loop to pluggable tool providers.
//! The built-in `vnc` provider keeps a registry of named VNC connections and
//! turns tool calls into pointer, keyboard, screenshot, and SSH actions;
//! external providers (stdio MCP servers, HTTP tool servers) are merged into
//! the same prefixed tool namespace.
//!
//! # Quick start
//!
//! ```no_run
//! use butler::agent::{Agent, AgentSettings};
//! use butler::api::ApiClient;
//! use butler::config::load_config;
//! use butler::desktop::rfb::RfbConnector;
//! use butler::desktop::ssh::SshCommandRunner;
//! use butler::tools::catalog::ToolCatalog;
//! use butler::tools::desktop::{DesktopProvider, DesktopSettings};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = load_config(None).unwrap().config;
//! let timeout = Duration::from_secs(10);
//! let mut catalog = ToolCatalog::new();
//! catalog.add_provider(Arc::new(DesktopProvider::new(
//!     Arc::new(RfbConnector::new(timeout)),
//!     Arc::new(SshCommandRunner::new(timeout)),
//!     DesktopSettings::default(),
//! )));
//! let client = ApiClient::new(&config.api, Duration::from_secs(config.api.timeout_secs));
//! let mut agent = Agent::new(Box::new(client), catalog, AgentSettings::from_config(&config, None));
//! let transcript = agent.execute_task("Open TextEdit").await.unwrap();
//! println!("{transcript}");
//! agent.shutdown().await;
//! # }
//! ```

pub mod agent;
pub mod api;
pub mod build_info;
pub mod config;
pub mod desktop;
pub mod error;
pub mod prompt;
pub mod render;
#[cfg(test)]
pub mod testsupport;
pub mod tools;
pub mod types;
