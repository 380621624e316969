//! Pluggable tool providers.
//!
//! A provider is a named source of tools (the in-process desktop provider, a
//! stdio MCP server, an HTTP tool server). The [`catalog::ToolCatalog`]
//! flattens every provider's tools into one prefixed namespace and routes
//! calls back to the right provider.

pub mod catalog;
pub mod desktop;
pub mod http;
pub mod mcp;

use crate::error::ToolError;
use crate::types::{ToolDescriptor, ToolResultContent};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Provider identity
// ---------------------------------------------------------------------------

/// Identifier of a tool provider; also the prefix of its catalog names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// Tool output
// ---------------------------------------------------------------------------

/// Result content of one tool call, forwarded verbatim to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: Vec<ToolResultContent>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::text(text)],
            is_error: false,
        }
    }

    /// A JSON value rendered as a single text block.
    pub fn json(value: &Value) -> Self {
        Self::text(value.to_string())
    }

    /// The uniform `{"success": false, "error": ...}` failure shape.
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            content: vec![ToolResultContent::text(
                json!({ "success": false, "error": error }).to_string(),
            )],
            is_error: true,
        }
    }

    /// Text parts joined with newlines; images are shown as a placeholder.
    pub fn render_text(&self) -> String {
        self.content
            .iter()
            .map(|part| match part {
                ToolResultContent::Text { text } => text.as_str(),
                ToolResultContent::Image { .. } => "[image]",
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// ToolProvider trait
// ---------------------------------------------------------------------------

/// A source of callable tools.
///
/// `list_tools` returns native names; the catalog adds the provider prefix.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    /// Invoke one native tool with JSON arguments.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError>;

    /// Release external resources (child processes, live sessions).
    async fn shutdown(&self) {}
}
