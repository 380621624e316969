//! Remote-desktop plumbing.
//!
//! The session registry owns live connections; the action executor borrows
//! one per call. Wire protocols sit behind traits so the registry and
//! executor can be driven by in-memory fakes in tests:
//! - [`DesktopConnector`] opens a [`DesktopSession`] (RFB in production),
//! - [`CommandRunner`] runs one command on the target host (SSH in production).

pub mod actions;
pub mod keys;
pub mod locator;
pub mod registry;
pub mod rfb;
pub mod ssh;

use crate::error::{DesktopError, SshError};
use async_trait::async_trait;

pub use locator::Locator;
pub use registry::{CleanupReport, ConnectionDescriptor, Credentials, SessionRegistry};

/// Pointer button for click actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Parse a button name. Anything other than left/right means middle.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::Middle,
        }
    }
}

/// A full captured frame in tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// An open, stateful remote-desktop connection.
#[async_trait]
pub trait DesktopSession: Send {
    /// Move the pointer to absolute coordinates.
    async fn move_to(&mut self, x: i64, y: i64) -> Result<(), DesktopError>;
    /// Click at the current pointer position.
    async fn click(&mut self, button: MouseButton) -> Result<(), DesktopError>;
    /// Type literal text.
    async fn write(&mut self, text: &str) -> Result<(), DesktopError>;
    /// Press and release one named key. Unknown names yield
    /// [`DesktopError::UnknownKey`].
    async fn press(&mut self, key: &str) -> Result<(), DesktopError>;
    async fn key_down(&mut self, key: &str) -> Result<(), DesktopError>;
    async fn key_up(&mut self, key: &str) -> Result<(), DesktopError>;
    /// Capture the whole remote frame buffer.
    async fn screenshot(&mut self) -> Result<Frame, DesktopError>;
    async fn close(&mut self) -> Result<(), DesktopError>;
}

/// Opens desktop sessions for a parsed locator.
#[async_trait]
pub trait DesktopConnector: Send + Sync {
    async fn connect(&self, locator: &Locator) -> Result<Box<dyn DesktopSession>, DesktopError>;
}

/// Host and credentials for one out-of-band command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Captured output of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<u32>,
}

/// Runs a single command on a remote host over a short-lived session.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, target: &SshTarget, command: &str) -> Result<CommandOutput, SshError>;
}
