//! One-shot SSH command execution with password authentication.

use super::{CommandOutput, CommandRunner, SshTarget};
use crate::error::SshError;
use async_trait::async_trait;
use russh::client::{self, AuthResult, Config as ClientConfig};
use russh::{ChannelMsg, Disconnect};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Runs each command over its own short-lived SSH session.
pub struct SshCommandRunner {
    connect_timeout: Duration,
    config: Arc<ClientConfig>,
}

impl SshCommandRunner {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            config: Arc::new(ClientConfig {
                inactivity_timeout: Some(Duration::from_secs(300)),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl CommandRunner for SshCommandRunner {
    async fn run(&self, target: &SshTarget, command: &str) -> Result<CommandOutput, SshError> {
        let addr = (target.host.as_str(), target.port);
        let socket = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| SshError::Connect(format!("timed out connecting to {}", target.host)))?
            .map_err(|e| SshError::Connect(e.to_string()))?;

        let handler = AcceptAnyHost {
            host: target.host.clone(),
            port: target.port,
        };
        let mut handle = client::connect_stream(self.config.clone(), socket, handler)
            .await
            .map_err(|e| SshError::Connect(e.to_string()))?;

        match handle
            .authenticate_password(target.user.clone(), target.password.clone())
            .await?
        {
            AuthResult::Success => {}
            AuthResult::Failure { .. } => return Err(SshError::AuthRejected(target.user.clone())),
        }

        info!(host = %target.host, user = %target.user, "running remote command");
        debug!(command, "ssh exec");
        let output = exec(&handle, command).await;

        if let Err(err) = handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(error = %err, "ssh disconnect failed");
        }
        output
    }
}

async fn exec(handle: &client::Handle<AcceptAnyHost>, command: &str) -> Result<CommandOutput, SshError> {
    let mut channel = handle.channel_open_session().await?;
    channel.exec(true, command).await?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            // Extended data type 1 is stderr.
            ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
            ChannelMsg::ExtendedData { .. } => {}
            ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
            _ => {}
        }
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_status,
    })
}

/// Host-key policy for lab targets: every key is accepted and logged.
struct AcceptAnyHost {
    host: String,
    port: u16,
}

impl client::Handler for AcceptAnyHost {
    type Error = russh::Error;

    fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> impl std::future::Future<Output = Result<bool, Self::Error>> + Send {
        let host = self.host.clone();
        let port = self.port;
        async move {
            warn!("accepting unverified host key for {}:{}", host, port);
            Ok(true)
        }
    }
}
