//! Client side of the plugin channel: handshake validation and the single
//! `run_command` round trip.

use std::time::Duration;

use tokio::process::Child;
use tracing::debug;

use crate::config::PROTOCOL_VERSION;
use crate::error::{PluginError, Result};

use super::protocol::{
    Handshake, RpcRequest, RpcResponse, RunCommandParams, RunCommandResult, MAIN_INTERFACE,
    RUN_COMMAND_METHOD,
};
use super::transport::Transport;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to a running plugin, bound to its `main` interface.
///
/// When backed by a spawned process the child handle is owned here with
/// `kill_on_drop` set, so every exit path (explicit shutdown, handshake
/// failure, cancellation) tears the process down.
pub struct PluginClient {
    transport: Transport,
    child: Option<Child>,
    next_id: i64,
}

impl std::fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginClient")
            .field("child", &self.child)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl PluginClient {
    pub fn new(transport: Transport, child: Option<Child>) -> Self {
        Self {
            transport,
            child,
            next_id: 1,
        }
    }

    /// Validate the plugin's startup handshake: fixed protocol version,
    /// echoed magic cookie, and the `main` interface on offer.
    pub async fn handshake(&mut self, expected_cookie: &str) -> Result<()> {
        let line = tokio::time::timeout(HANDSHAKE_TIMEOUT, self.transport.receive())
            .await
            .map_err(|_| {
                PluginError::Protocol("timed out waiting for plugin handshake".to_string())
            })?
            .map_err(|err| self.describe_exit(err))?;

        let handshake: Handshake = serde_json::from_str(&line)
            .map_err(|err| PluginError::Protocol(format!("malformed handshake: {err}")))?;

        if handshake.protocol_version != PROTOCOL_VERSION {
            return Err(PluginError::Protocol(format!(
                "plugin speaks protocol version {}, expected {PROTOCOL_VERSION}",
                handshake.protocol_version
            )));
        }

        if handshake.cookie != expected_cookie {
            return Err(PluginError::Protocol(
                "magic cookie mismatch in plugin handshake".to_string(),
            ));
        }

        if !handshake.interfaces.iter().any(|i| i == MAIN_INTERFACE) {
            return Err(PluginError::Protocol(format!(
                "plugin does not expose the '{MAIN_INTERFACE}' interface"
            )));
        }

        debug!("plugin handshake complete");
        Ok(())
    }

    /// Issue exactly one `run_command` round trip. No retries; a remote
    /// error propagates verbatim, distinct from channel failures.
    pub async fn run_command(&mut self, argv: &[String]) -> Result<String> {
        let id = self.next_id;
        self.next_id += 1;

        let params = RunCommandParams {
            argv: argv.to_vec(),
        };
        let request = RpcRequest::new(
            id,
            RUN_COMMAND_METHOD,
            Some(serde_json::to_value(params).map_err(|err| {
                PluginError::Protocol(format!("failed to encode request: {err}"))
            })?),
        );
        let encoded = serde_json::to_string(&request)
            .map_err(|err| PluginError::Protocol(format!("failed to encode request: {err}")))?;

        self.transport.send(&encoded).await?;

        let line = self
            .transport
            .receive()
            .await
            .map_err(|err| self.describe_exit(err))?;
        let response: RpcResponse = serde_json::from_str(&line)
            .map_err(|err| PluginError::Protocol(format!("malformed response: {err}")))?;

        if response.id != Some(id) {
            return Err(PluginError::Protocol(format!(
                "response id {:?} does not match request id {id}",
                response.id
            )));
        }

        if let Some(error) = response.error {
            return Err(PluginError::UpstreamCommand(error.message));
        }

        let result: RunCommandResult = match response.result {
            Some(value) => serde_json::from_value(value)
                .map_err(|err| PluginError::Protocol(format!("malformed result: {err}")))?,
            None => RunCommandResult::default(),
        };

        Ok(result.output)
    }

    /// Kill and reap the child. Drop does the same via `kill_on_drop`;
    /// calling this just reaps synchronously.
    pub async fn shutdown(mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }

    /// Attach the child's exit status to a channel error when the process
    /// has already died; a bare "channel closed" hides the real story.
    fn describe_exit(&mut self, err: PluginError) -> PluginError {
        if let Some(child) = self.child.as_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                return PluginError::Protocol(format!("plugin process exited with {status}"));
            }
        }
        err
    }
}
