//! Plugin process launcher.
//!
//! Pins the on-disk binary to its manifest digest before spawning (the last
//! line of defense if install was bypassed), delivers the magic cookie via
//! the negotiation environment variable, and hands back a [`PluginClient`]
//! once the handshake checks out. The child is spawned with `kill_on_drop`,
//! so a failure on any path after spawn still tears it down.

use std::process::Stdio;

use sha2::{Digest as _, Sha256};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{PluginError, Result};
use crate::installer::digests_match;
use crate::manifest::Plugin;
use crate::paths;
use crate::rpc::{PluginClient, Transport};

pub struct Launcher {
    config: Config,
}

impl Launcher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Spawn the installed binary and complete the handshake. A missing
    /// binary surfaces as a filesystem error so the caller can install
    /// on demand; everything after spawn fails as a protocol error with
    /// the child already doomed by its drop guard.
    pub async fn launch(&self, plugin: &Plugin, version: &str) -> Result<PluginClient> {
        let binary =
            paths::plugin_binary(&self.config, &plugin.shortname, version, &plugin.binary);

        if self.config.dev_mode() {
            warn!(
                path = %binary.display(),
                "development override active, skipping binary digest verification"
            );
        } else {
            let expected =
                plugin.release_digest(&self.config.os, &self.config.arch, version)?;
            let bytes = fs::read(&binary)
                .await
                .map_err(|err| PluginError::fs(&binary, err))?;
            let actual = Sha256::digest(&bytes);
            if !digests_match(actual.as_slice(), &expected) {
                return Err(PluginError::Protocol(format!(
                    "binary at {} does not match the manifest digest, refusing to launch",
                    binary.display()
                )));
            }
        }

        let cookie_key = format!("plugin_{}", plugin.shortname);
        debug!(binary = %binary.display(), %cookie_key, "spawning plugin");

        let mut child = Command::new(&binary)
            .env(&cookie_key, &plugin.magic_cookie_value)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    PluginError::fs(&binary, err)
                } else {
                    PluginError::Protocol(format!(
                        "failed to spawn {}: {err}",
                        binary.display()
                    ))
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PluginError::Protocol("plugin stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginError::Protocol("plugin stdout unavailable".to_string()))?;

        // The plugin's own diagnostics stream straight through to ours.
        if let Some(mut stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut stderr, &mut tokio::io::stderr()).await;
            });
        }

        let mut client = PluginClient::new(Transport::new(stdout, stdin), Some(child));
        client.handshake(&plugin.magic_cookie_value).await?;
        Ok(client)
    }
}
