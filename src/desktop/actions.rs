//! Primitive desktop actions against a borrowed live session.
//!
//! Every action reports an [`ActionOutcome`]; transport failures are caught
//! here and never escape as errors.

use super::keys::canonical_key;
use super::{CommandOutput, CommandRunner, ConnectionDescriptor, DesktopSession, MouseButton};
use crate::error::{ActionError, DesktopError, SshError};
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// File written when a screenshot call names none.
pub const DEFAULT_SCREENSHOT_FILE: &str = "screenshot.png";

/// Uniform `{success, error?, ...}` result of one action.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<u32>,
    /// Captured PNG, base64-encoded. Travels as an image block, not JSON.
    #[serde(skip)]
    pub image_png_base64: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Result<ActionOutcome, ActionError>> for ActionOutcome {
    fn from(result: Result<ActionOutcome, ActionError>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(error = %err, "desktop action failed");
                Self::failure(err.to_string())
            }
        }
    }
}

/// Move the pointer to `(x, y)` and click. Coordinates are not bounds-checked.
pub async fn click(
    session: &mut dyn DesktopSession,
    x: i64,
    y: i64,
    button: MouseButton,
) -> ActionOutcome {
    let result: Result<_, ActionError> = async {
        session.move_to(x, y).await?;
        session.click(button).await?;
        Ok(ActionOutcome::ok())
    }
    .await;
    result.into()
}

/// Type literal text, then optionally pause.
pub async fn type_text(session: &mut dyn DesktopSession, text: &str, delay: Duration) -> ActionOutcome {
    let result: Result<_, ActionError> = async {
        session.write(text).await?;
        pause(delay).await;
        Ok(ActionOutcome::ok())
    }
    .await;
    result.into()
}

/// Press one key by friendly or canonical name, then optionally pause.
///
/// A single character the session has no keysym for is typed instead.
pub async fn press_key(session: &mut dyn DesktopSession, key: &str, delay: Duration) -> ActionOutcome {
    let result: Result<_, ActionError> = async {
        press_with_fallback(session, key).await?;
        pause(delay).await;
        Ok(ActionOutcome::ok())
    }
    .await;
    result.into()
}

/// Hold every key but the last, press the last, then release the held keys.
pub async fn hotkey(session: &mut dyn DesktopSession, keys: &[String]) -> ActionOutcome {
    let Some((last, modifiers)) = keys.split_last() else {
        return ActionOutcome::failure("hotkey requires at least one key");
    };

    let mut hold = ModifierHold::default();
    let mut result = Ok(());
    for modifier in modifiers {
        if let Err(err) = hold.acquire(session, &canonical_key(modifier)).await {
            result = Err(ActionError::from(err));
            break;
        }
    }
    if result.is_ok() {
        result = press_with_fallback(session, last).await;
    }
    hold.release(session).await;

    result.map(|()| ActionOutcome::ok()).into()
}

/// Capture the frame buffer and write it as PNG to `path`.
///
/// With `attach` set the outcome also carries the PNG bytes for the model.
pub async fn screenshot(session: &mut dyn DesktopSession, path: &Path, attach: bool) -> ActionOutcome {
    let result: Result<_, ActionError> = async {
        let frame = session.screenshot().await?;
        let png = encode_png(frame.width, frame.height, frame.rgba)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(DesktopError::from)?;
        }
        tokio::fs::write(path, &png)
            .await
            .map_err(DesktopError::from)?;
        debug!(path = %path.display(), bytes = png.len(), "screenshot written");

        let mut outcome = ActionOutcome::ok();
        outcome.file = Some(path.display().to_string());
        if attach {
            outcome.image_png_base64 = Some(base64::engine::general_purpose::STANDARD.encode(&png));
        }
        Ok(outcome)
    }
    .await;
    result.into()
}

/// Resolve a requested screenshot file against an optional output directory.
pub fn screenshot_path(dir: Option<&Path>, file: Option<&str>) -> PathBuf {
    let file = file
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_SCREENSHOT_FILE);
    match dir {
        Some(dir) if Path::new(file).is_relative() => dir.join(file),
        _ => PathBuf::from(file),
    }
}

/// Run one command on the descriptor's host over the command channel.
///
/// Fails closed when any credential is missing. A non-zero exit status is a
/// failure that still carries both output streams.
pub async fn run_command(
    runner: &dyn CommandRunner,
    descriptor: &ConnectionDescriptor,
    command: &str,
) -> ActionOutcome {
    let Some(target) = descriptor.ssh_target() else {
        warn!(connection = %descriptor.name, "ssh requested without credentials");
        return ActionError::from(SshError::MissingCredentials).into_outcome();
    };

    match runner.run(&target, command).await {
        Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        }) => match exit_status {
            Some(status) if status != 0 => {
                let err = SshError::CommandFailed {
                    status,
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                };
                let mut outcome = ActionOutcome::failure(err.to_string());
                outcome.stdout = Some(stdout);
                outcome.stderr = Some(stderr);
                outcome.exit_status = Some(status);
                outcome
            }
            _ => ActionOutcome {
                success: true,
                stdout: Some(stdout),
                stderr: Some(stderr),
                exit_status,
                ..ActionOutcome::default()
            },
        },
        Err(err) => ActionError::from(err).into_outcome(),
    }
}

impl ActionError {
    pub(crate) fn into_outcome(self) -> ActionOutcome {
        Err::<ActionOutcome, _>(self).into()
    }
}

async fn press_with_fallback(session: &mut dyn DesktopSession, key: &str) -> Result<(), ActionError> {
    let mapped = canonical_key(key);
    match session.press(&mapped).await {
        Err(DesktopError::UnknownKey(_)) if key.chars().count() == 1 => {
            debug!(key, "no keysym for key, typing it instead");
            session.write(key).await?;
            Ok(())
        }
        other => Ok(other?),
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn encode_png(width: u32, height: u32, rgba: Vec<u8>) -> Result<Vec<u8>, DesktopError> {
    let image = image::RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        DesktopError::Image(format!("frame buffer does not match {width}x{height}"))
    })?;
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| DesktopError::Image(e.to_string()))?;
    Ok(png)
}

/// Keys held down for the duration of a hotkey.
#[derive(Default)]
struct ModifierHold {
    held: Vec<String>,
}

impl ModifierHold {
    async fn acquire(&mut self, session: &mut dyn DesktopSession, key: &str) -> Result<(), DesktopError> {
        session.key_down(key).await?;
        self.held.push(key.to_string());
        Ok(())
    }

    /// Release in reverse order. Release failures are logged, not returned.
    async fn release(self, session: &mut dyn DesktopSession) {
        for key in self.held.into_iter().rev() {
            if let Err(err) = session.key_up(&key).await {
                warn!(key = %key, error = %err, "failed to release held key");
            }
        }
    }
}
