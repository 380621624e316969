//! Unified error types.
//!
//! Every boundary that talks to something remote (model API, desktop session,
//! SSH host, tool provider) returns one of these instead of panicking, so the
//! conversation loop can turn failures into readable tool results.

use std::fmt;

// ---------------------------------------------------------------------------
// ToolError
// ---------------------------------------------------------------------------

/// Errors arising from tool providers.
#[derive(Debug)]
pub enum ToolError {
    /// The model supplied arguments the tool couldn't parse.
    InvalidArguments(String),
    /// The tool ran but encountered a failure.
    ExecutionFailed(String),
    /// The provider process or endpoint is unreachable or misbehaving.
    Provider(String),
    /// No loaded provider exposes this prefixed name.
    NotFound(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
            Self::ExecutionFailed(msg) => write!(f, "execution failed: {msg}"),
            Self::Provider(msg) => write!(f, "provider error: {msg}"),
            Self::NotFound(name) => write!(f, "Tool {name} not found"),
        }
    }
}

impl std::error::Error for ToolError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the model HTTP API.
#[derive(Debug)]
pub enum ApiError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the API.
    Status {
        code: u16,
        body: String,
        retry_after_secs: Option<u64>,
    },
    /// The body could not be interpreted as a messages response.
    InvalidResponse(String),
}

impl ApiError {
    pub fn status(code: u16, body: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::Status {
            code,
            body: body.into(),
            retry_after_secs,
        }
    }

    /// HTTP status code when the error came from a non-2xx response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Server-provided `Retry-After` hint in seconds.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Status {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status { code, body, .. } => write!(f, "status {code}: {body}"),
            Self::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// DesktopError
// ---------------------------------------------------------------------------

/// Failures raised by a remote-desktop transport.
#[derive(Debug)]
pub enum DesktopError {
    Io(std::io::Error),
    /// No keysym is known for the requested key name.
    UnknownKey(String),
    /// The server sent something this client does not understand.
    Protocol(String),
    /// The server rejected our credentials.
    AuthFailed(String),
    /// Connecting took longer than the configured timeout.
    Timeout,
    /// Encoding or writing a captured frame failed.
    Image(String),
}

impl fmt::Display for DesktopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::UnknownKey(key) => write!(f, "unknown key: {key}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::AuthFailed(msg) => write!(f, "authentication failed: {msg}"),
            Self::Timeout => write!(f, "timed out connecting to desktop"),
            Self::Image(msg) => write!(f, "image error: {msg}"),
        }
    }
}

impl std::error::Error for DesktopError {}

impl From<std::io::Error> for DesktopError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Structured outcomes of session-registry operations.
#[derive(Debug)]
pub enum RegistryError {
    /// Locator scheme is not `vnc`.
    UnsupportedScheme(String),
    /// Locator could not be parsed (missing host, bad port, ...).
    InvalidLocator(String),
    NotRegistered(String),
    ConnectFailed { name: String, cause: String },
    NotConnected(String),
    DisconnectFailed { name: String, cause: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedScheme(scheme) => {
                write!(f, "Unsupported scheme: {scheme:?}, expected vnc://")
            }
            Self::InvalidLocator(msg) => write!(f, "invalid locator: {msg}"),
            Self::NotRegistered(name) => write!(f, "Connection {name} not registered"),
            Self::ConnectFailed { name, cause } => {
                write!(f, "Failed to connect to {name}: {cause}")
            }
            Self::NotConnected(name) => write!(f, "Connection {name} is not active"),
            Self::DisconnectFailed { name, cause } => {
                write!(f, "Failed to disconnect from {name}: {cause}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

// ---------------------------------------------------------------------------
// SshError
// ---------------------------------------------------------------------------

/// Failures of the out-of-band command channel.
#[derive(Debug)]
pub enum SshError {
    /// Host, user or password missing for the descriptor.
    MissingCredentials,
    Connect(String),
    AuthRejected(String),
    /// The command ran but exited non-zero.
    CommandFailed {
        status: u32,
        stdout: String,
        stderr: String,
    },
    Channel(String),
}

impl fmt::Display for SshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "Missing SSH credentials"),
            Self::Connect(msg) => write!(f, "ssh connect: {msg}"),
            Self::AuthRejected(user) => write!(f, "ssh authentication rejected for {user}"),
            Self::CommandFailed { status, stderr, .. } => {
                write!(f, "command exited with status {status}")?;
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
            Self::Channel(msg) => write!(f, "ssh channel: {msg}"),
        }
    }
}

impl std::error::Error for SshError {}

impl From<russh::Error> for SshError {
    fn from(e: russh::Error) -> Self {
        Self::Channel(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// ActionError
// ---------------------------------------------------------------------------

/// Failure of one desktop action, rendered into a failure outcome.
#[derive(Debug)]
pub enum ActionError {
    /// Connect-on-demand failed for the named connection.
    CouldNotConnect(String),
    Registry(RegistryError),
    Desktop(DesktopError),
    Ssh(SshError),
    /// The request itself was unusable (empty hotkey, ...).
    Invalid(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CouldNotConnect(name) => write!(f, "Could not connect to {name}"),
            Self::Registry(e) => write!(f, "{e}"),
            Self::Desktop(e) => write!(f, "{e}"),
            Self::Ssh(e) => write!(f, "{e}"),
            Self::Invalid(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<RegistryError> for ActionError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<DesktopError> for ActionError {
    fn from(e: DesktopError) -> Self {
        Self::Desktop(e)
    }
}

impl From<SshError> for ActionError {
    fn from(e: SshError) -> Self {
        Self::Ssh(e)
    }
}

// ---------------------------------------------------------------------------
// AgentError
// ---------------------------------------------------------------------------

/// Errors that abort one query of the conversation loop.
#[derive(Debug)]
pub enum AgentError {
    Api(ApiError),
    /// The conversation loop exceeded the configured iteration cap.
    MaxIterationsReached,
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "api: {e}"),
            Self::MaxIterationsReached => write!(f, "max conversation iterations reached"),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<ApiError> for AgentError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}
