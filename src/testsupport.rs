//! Shared test fixtures for desktop, tool, and agent test modules.
//!
//! In-memory stand-ins for the traits at the wire seams: a scripted model
//! client, a recording tool provider, a fake desktop session with its
//! connector, and a fake SSH command runner.

use crate::api::ModelClient;
use crate::desktop::keys::keysym_for_name;
use crate::desktop::{
    CommandOutput, CommandRunner, DesktopConnector, DesktopSession, Frame, Locator, MouseButton,
    SshTarget,
};
use crate::error::{ApiError, DesktopError, SshError, ToolError};
use crate::tools::{ProviderId, ToolOutput, ToolProvider};
use crate::types::{ContentBlock, MessagesRequest, MessagesResponse, ToolDescriptor};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!("butler-{prefix}-{millis}-{suffix}"));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

// ---------------------------------------------------------------------------
// Model client
// ---------------------------------------------------------------------------

/// Scripted model client. Clones share the reply queue and request log.
#[derive(Clone, Default)]
pub struct MockClient {
    replies: Arc<Mutex<VecDeque<Result<MessagesResponse, ApiError>>>>,
    requests: Arc<Mutex<Vec<MessagesRequest>>>,
}

impl MockClient {
    pub fn new(replies: Vec<Result<MessagesResponse, ApiError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<MessagesRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for MockClient {
    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::status(500, "mock client has no scripted reply", None)))
    }
}

/// A reply carrying one text block.
pub fn text_response(id: &str, text: &str) -> MessagesResponse {
    MessagesResponse {
        id: id.to_string(),
        content: vec![ContentBlock::text(text)],
        stop_reason: Some("end_turn".into()),
        usage: None,
    }
}

/// A reply with optional leading text followed by `(id, name, input)` tool calls.
pub fn tool_use_response(
    id: &str,
    text: Option<&str>,
    calls: &[(&str, &str, Value)],
) -> MessagesResponse {
    let mut content: Vec<ContentBlock> = text.map(ContentBlock::text).into_iter().collect();
    content.extend(calls.iter().map(|(call_id, name, input)| ContentBlock::ToolUse {
        id: call_id.to_string(),
        name: name.to_string(),
        input: input.clone(),
    }));
    MessagesResponse {
        id: id.to_string(),
        content,
        stop_reason: Some("tool_use".into()),
        usage: None,
    }
}

// ---------------------------------------------------------------------------
// Tool provider
// ---------------------------------------------------------------------------

/// Provider that records calls and answers from a FIFO of scripted results.
pub struct RecordingProvider {
    id: ProviderId,
    tools: Vec<String>,
    calls: Mutex<Vec<(String, Value)>>,
    responses: Mutex<VecDeque<Result<ToolOutput, ToolError>>>,
    listing_fails: Mutex<bool>,
}

impl RecordingProvider {
    /// Tools are described as `"{name} tool"`.
    pub fn new(id: &str, tools: &[&str]) -> Self {
        Self {
            id: ProviderId::from(id),
            tools: tools.iter().map(|name| name.to_string()).collect(),
            calls: Mutex::default(),
            responses: Mutex::default(),
            listing_fails: Mutex::new(false),
        }
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_response(&self, response: Result<ToolOutput, ToolError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn fail_listing(&self) {
        *self.listing_fails.lock().unwrap() = true;
    }
}

#[async_trait]
impl ToolProvider for RecordingProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        if *self.listing_fails.lock().unwrap() {
            return Err(ToolError::Provider("listing unavailable".into()));
        }
        Ok(self
            .tools
            .iter()
            .map(|name| ToolDescriptor {
                name: name.clone(),
                description: format!("{name} tool"),
                input_schema: json!({ "type": "object", "properties": {} }),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ToolOutput::json(&json!({ "success": true }))))
    }
}

// ---------------------------------------------------------------------------
// Desktop
// ---------------------------------------------------------------------------

/// In-memory desktop session logging every input event as a short string.
pub struct FakeDesktop {
    events: Arc<Mutex<Vec<String>>>,
    held: BTreeSet<String>,
    failing_keys: HashSet<String>,
    screenshots_fail: bool,
    on_close: Option<CloseHook>,
}

struct CloseHook {
    host: String,
    closed: Arc<AtomicUsize>,
    failing_hosts: Arc<Mutex<HashSet<String>>>,
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self::with_log(Arc::default())
    }

    fn with_log(events: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            events,
            held: BTreeSet::new(),
            failing_keys: HashSet::new(),
            screenshots_fail: false,
            on_close: None,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Keys currently pressed down and not yet released.
    pub fn held_keys(&self) -> Vec<String> {
        self.held.iter().cloned().collect()
    }

    pub fn fail_press(&mut self, key: &str) {
        self.failing_keys.insert(key.to_string());
    }

    pub fn fail_screenshots(&mut self) {
        self.screenshots_fail = true;
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn check_key(&self, key: &str) -> Result<(), DesktopError> {
        if keysym_for_name(key).is_none() || self.failing_keys.contains(key) {
            return Err(DesktopError::UnknownKey(key.to_string()));
        }
        Ok(())
    }
}

impl Default for FakeDesktop {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DesktopSession for FakeDesktop {
    async fn move_to(&mut self, x: i64, y: i64) -> Result<(), DesktopError> {
        self.record(format!("move {x},{y}"));
        Ok(())
    }

    async fn click(&mut self, button: MouseButton) -> Result<(), DesktopError> {
        self.record(format!("click {button:?}"));
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), DesktopError> {
        self.record(format!("write {text}"));
        Ok(())
    }

    async fn press(&mut self, key: &str) -> Result<(), DesktopError> {
        self.check_key(key)?;
        self.record(format!("press {key}"));
        Ok(())
    }

    async fn key_down(&mut self, key: &str) -> Result<(), DesktopError> {
        self.check_key(key)?;
        self.held.insert(key.to_string());
        self.record(format!("down {key}"));
        Ok(())
    }

    async fn key_up(&mut self, key: &str) -> Result<(), DesktopError> {
        self.check_key(key)?;
        self.held.remove(key);
        self.record(format!("up {key}"));
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Frame, DesktopError> {
        if self.screenshots_fail {
            return Err(DesktopError::Protocol("frame buffer update lost".into()));
        }
        let (width, height) = (4u32, 3u32);
        Ok(Frame {
            width,
            height,
            rgba: [0x20, 0x40, 0x80, 0xff].repeat((width * height) as usize),
        })
    }

    async fn close(&mut self) -> Result<(), DesktopError> {
        if let Some(hook) = &self.on_close {
            hook.closed.fetch_add(1, Ordering::SeqCst);
            if hook.failing_hosts.lock().unwrap().contains(&hook.host) {
                return Err(DesktopError::Protocol("socket already closed".into()));
            }
        }
        Ok(())
    }
}

/// Connector handing out [`FakeDesktop`] sessions that share one event log.
#[derive(Default)]
pub struct FakeConnector {
    events: Arc<Mutex<Vec<String>>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    refused: Mutex<HashSet<String>>,
    failing_close: Arc<Mutex<HashSet<String>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Close calls seen, including ones that reported an error.
    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn refuse_host(&self, host: &str) {
        self.refused.lock().unwrap().insert(host.to_string());
    }

    pub fn fail_close_for(&self, host: &str) {
        self.failing_close.lock().unwrap().insert(host.to_string());
    }

    /// Input events from every session this connector opened.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl DesktopConnector for FakeConnector {
    async fn connect(&self, locator: &Locator) -> Result<Box<dyn DesktopSession>, DesktopError> {
        if self.refused.lock().unwrap().contains(&locator.host) {
            return Err(DesktopError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let mut session = FakeDesktop::with_log(self.events.clone());
        session.on_close = Some(CloseHook {
            host: locator.host.clone(),
            closed: self.closed.clone(),
            failing_hosts: self.failing_close.clone(),
        });
        Ok(Box::new(session))
    }
}

// ---------------------------------------------------------------------------
// SSH
// ---------------------------------------------------------------------------

/// Command runner recording `(user@host:port, command)` pairs.
#[derive(Default)]
pub struct FakeCommandRunner {
    outputs: Mutex<VecDeque<CommandOutput>>,
    commands: Mutex<Vec<(String, String)>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the output of the next command. Unscripted commands exit 0 silently.
    pub fn push_output(&self, output: CommandOutput) {
        self.outputs.lock().unwrap().push_back(output);
    }

    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, target: &SshTarget, command: &str) -> Result<CommandOutput, SshError> {
        self.commands.lock().unwrap().push((
            format!("{}@{}:{}", target.user, target.host, target.port),
            command.to_string(),
        ));
        Ok(self
            .outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_status: Some(0),
            }))
    }
}
