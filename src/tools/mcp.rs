//! Tool provider backed by an MCP server speaking JSON-RPC over stdio.
//!
//! Messages are newline-delimited JSON. The provider performs the
//! `initialize` handshake once at startup, then serves `tools/list` and
//! `tools/call` requests one at a time.

use super::{ProviderId, ToolOutput, ToolProvider};
use crate::build_info;
use crate::error::ToolError;
use crate::types::{ImageSource, ToolDescriptor, ToolResultContent};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

type BoxedReader = BufReader<Box<dyn AsyncRead + Unpin + Send>>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Minimal JSON-RPC client for one MCP server.
struct McpClient {
    reader: BoxedReader,
    writer: BoxedWriter,
    next_id: AtomicU64,
}

impl McpClient {
    fn new(reader: Box<dyn AsyncRead + Unpin + Send>, writer: BoxedWriter) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            next_id: AtomicU64::new(1),
        }
    }

    async fn initialize(&mut self) -> Result<Value, ToolError> {
        let result = self
            .call_method(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "butler", "version": build_info::VERSION }
                }),
            )
            .await?;
        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    async fn notify(&mut self, method: &str) -> Result<(), ToolError> {
        self.send(&json!({ "jsonrpc": "2.0", "method": method })).await
    }

    async fn send(&mut self, message: &Value) -> Result<(), ToolError> {
        let mut encoded = message.to_string();
        encoded.push('\n');
        self.writer
            .write_all(encoded.as_bytes())
            .await
            .map_err(io_error)?;
        self.writer.flush().await.map_err(io_error)
    }

    async fn call_method(&mut self, method: &str, params: Value) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .await?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line).await.map_err(io_error)?;
            if read == 0 {
                return Err(ToolError::Provider("mcp server closed connection".into()));
            }
            let Ok(value) = serde_json::from_str::<Value>(line.trim()) else {
                debug!(line = line.trim(), "ignoring non-json line from mcp server");
                continue;
            };
            if !is_response_to(&value, id) {
                continue;
            }
            if let Some(error) = value.get("error") {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(ToolError::Provider(format!("rpc error: {message}")));
            }
            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

/// Notifications, server-initiated requests and replies to other ids are not
/// the response we wait for.
fn is_response_to(message: &Value, id: u64) -> bool {
    if message.get("method").is_some() {
        return false;
    }
    message
        .get("id")
        .is_some_and(|response_id| matches_id(response_id, id))
}

fn matches_id(value: &Value, expected: u64) -> bool {
    match value {
        Value::Number(num) => num.as_u64() == Some(expected),
        Value::String(text) => text.parse::<u64>().ok() == Some(expected),
        _ => false,
    }
}

fn io_error(e: std::io::Error) -> ToolError {
    ToolError::Provider(format!("io error: {e}"))
}

/// An MCP server reached over a child process's stdin/stdout.
pub struct McpStdioProvider {
    id: ProviderId,
    client: Mutex<McpClient>,
    child: Mutex<Option<Child>>,
}

impl McpStdioProvider {
    /// Spawn `command args...` and complete the MCP handshake.
    pub async fn spawn(id: ProviderId, command: &str, args: &[String]) -> Result<Self, ToolError> {
        info!(provider = %id, command, ?args, "starting mcp server");
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Provider(format!("failed to start `{command}`: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::Provider("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Provider("child stdout unavailable".into()))?;

        let mut provider = Self::connect(id, Box::new(stdout), Box::new(stdin)).await?;
        provider.child = Mutex::new(Some(child));
        Ok(provider)
    }

    /// Handshake over already-open streams.
    pub async fn connect(
        id: ProviderId,
        reader: Box<dyn AsyncRead + Unpin + Send>,
        writer: BoxedWriter,
    ) -> Result<Self, ToolError> {
        let mut client = McpClient::new(reader, writer);
        let info = client.initialize().await?;
        let server_name = info
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(provider = %id, server = server_name, "mcp server initialized");
        Ok(Self {
            id,
            client: Mutex::new(client),
            child: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ToolProvider for McpStdioProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let result = self
            .client
            .lock()
            .await
            .call_method("tools/list", json!({}))
            .await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(tools.iter().filter_map(descriptor_from_value).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        let result = self
            .client
            .lock()
            .await
            .call_method("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        Ok(output_from_result(&result))
    }

    async fn shutdown(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        if let Err(err) = child.kill().await {
            warn!(provider = %self.id, error = %err, "failed to stop mcp server");
        } else {
            debug!(provider = %self.id, "mcp server stopped");
        }
    }
}

fn descriptor_from_value(tool: &Value) -> Option<ToolDescriptor> {
    let name = tool.get("name")?.as_str()?.to_string();
    Some(ToolDescriptor {
        name,
        description: tool
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        input_schema: tool
            .get("inputSchema")
            .cloned()
            .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
    })
}

/// Map a `tools/call` result onto tool-result content.
fn output_from_result(result: &Value) -> ToolOutput {
    let content = result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| parts.iter().map(content_part).collect())
        .unwrap_or_else(|| vec![ToolResultContent::text(result.to_string())]);
    ToolOutput {
        content,
        is_error: result.get("isError").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn content_part(part: &Value) -> ToolResultContent {
    match part.get("type").and_then(Value::as_str) {
        Some("text") => {
            ToolResultContent::text(part.get("text").and_then(Value::as_str).unwrap_or_default())
        }
        Some("image") => {
            let data = part.get("data").and_then(Value::as_str).unwrap_or_default();
            let mime = part
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            ToolResultContent::Image {
                source: ImageSource::base64(mime, data),
            }
        }
        _ => ToolResultContent::text(part.to_string()),
    }
}
