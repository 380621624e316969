//! Tool provider backed by an HTTP tool server.
//!
//! The server exposes `GET /tools` returning `{"tools": [...]}` and
//! `POST /execute` accepting `{"tool_name", "arguments"}` and answering with
//! `{"result": ...}` or `{"error": "..."}`.

use super::{ProviderId, ToolOutput, ToolProvider};
use crate::error::ToolError;
use crate::types::ToolDescriptor;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct ToolList {
    #[serde(default)]
    tools: Vec<RemoteTool>,
}

#[derive(Deserialize)]
struct RemoteTool {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "inputSchema")]
    input_schema: Option<Value>,
}

#[derive(Deserialize)]
struct ExecuteReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Provider for one HTTP tool server.
pub struct HttpToolProvider {
    id: ProviderId,
    base_url: String,
    http: reqwest::Client,
}

impl HttpToolProvider {
    pub fn new(id: impl Into<ProviderId>, base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            id: id.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[async_trait]
impl ToolProvider for HttpToolProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let url = format!("{}/tools", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::Provider(format!("GET {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(ToolError::Provider(format!(
                "GET {url}: status {}",
                response.status().as_u16()
            )));
        }
        let list: ToolList = response
            .json()
            .await
            .map_err(|e| ToolError::Provider(format!("GET {url}: {e}")))?;

        Ok(list
            .tools
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.name,
                description: tool.description,
                input_schema: tool
                    .input_schema
                    .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        let url = format!("{}/execute", self.base_url);
        debug!(provider = %self.id, tool = name, "http tool call");
        let response = self
            .http
            .post(&url)
            .json(&json!({ "tool_name": name, "arguments": arguments }))
            .send()
            .await
            .map_err(|e| ToolError::Provider(format!("POST {url}: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Provider(format!("POST {url}: {e}")))?;

        let reply: ExecuteReply = serde_json::from_str(&body).map_err(|_| {
            ToolError::Provider(format!("POST {url}: status {}: {body}", status.as_u16()))
        })?;
        if let Some(error) = reply.error {
            return Ok(ToolOutput::failure(error));
        }
        if !status.is_success() {
            return Ok(ToolOutput::failure(format!("status {}", status.as_u16())));
        }
        Ok(match reply.result {
            Some(Value::String(text)) => ToolOutput::text(text),
            Some(value) => ToolOutput::json(&value),
            None => ToolOutput::json(&Value::Null),
        })
    }
}
