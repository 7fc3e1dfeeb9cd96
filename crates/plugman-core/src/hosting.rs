//! Plugin hosting resolution and resource fetching.
//!
//! The artifact base URL normally comes from an authenticated metadata
//! endpoint; a configured override short-circuits that, and a non-HTTP base
//! is treated as a local directory so tests and air-gapped setups can serve
//! artifacts from disk.

use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{PluginError, Result};

#[derive(Debug, Deserialize)]
struct PluginMetadata {
    base_url: String,
}

/// Resolves where plugin artifacts and the manifest are hosted.
#[derive(Clone)]
pub struct HostingClient {
    http: reqwest::Client,
    config: Config,
}

impl HostingClient {
    pub fn new(http: reqwest::Client, config: Config) -> Self {
        Self { http, config }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Base location for plugin downloads. Uses the configured override
    /// when present, else asks the metadata endpoint with the caller's
    /// credential.
    pub async fn plugin_base_url(&self) -> Result<String> {
        if let Some(base) = &self.config.plugin_base_url {
            debug!(%base, "using configured plugin base");
            return Ok(base.clone());
        }

        let url = format!(
            "{}/v1/plugins/metadata",
            self.config.api_base_url.trim_end_matches('/')
        );

        let mut request = self.http.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| remote_err(&url, err))?
            .error_for_status()
            .map_err(|err| remote_err(&url, err))?;

        let metadata: PluginMetadata = response
            .json()
            .await
            .map_err(|err| remote_err(&url, err))?;

        Ok(metadata.base_url)
    }
}

/// Fetch a resource body, reading the response exactly once. HTTP locations
/// go over the wire; anything else is read from the local filesystem, still
/// surfacing failures as remote errors since it stands in for the remote
/// source.
pub async fn fetch_resource(http: &reqwest::Client, location: &str) -> Result<Vec<u8>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = http
            .get(location)
            .send()
            .await
            .map_err(|err| remote_err(location, err))?
            .error_for_status()
            .map_err(|err| remote_err(location, err))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|err| remote_err(location, err))?;
        Ok(bytes.to_vec())
    } else {
        tokio::fs::read(location)
            .await
            .map_err(|err| PluginError::Remote {
                url: location.to_string(),
                reason: err.to_string(),
            })
    }
}

/// Join a path segment onto a base URL or local directory.
pub fn join_location(base: &str, rest: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rest)
}

fn remote_err(url: &str, err: reqwest::Error) -> PluginError {
    PluginError::Remote {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
