//! Plugin manifest: catalog of approved plugins and their releases.
//!
//! Cached as TOML at `<config-root>/plugins.toml` and refreshed from the
//! hosting source. Reloaded on every invocation; nothing is held in memory
//! across runs.

use std::path::PathBuf;

use serde::Deserialize;
use tokio::fs;
use tracing::info;

use crate::config::Config;
use crate::error::{PluginError, Result};
use crate::hosting::{fetch_resource, join_location, HostingClient};
use crate::paths;

pub const MANIFEST_FILE: &str = "plugins.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub plugins: Vec<Plugin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    /// Unique lookup key, matched case-insensitively.
    pub shortname: String,
    /// Name of the executable inside the version directory.
    pub binary: String,
    /// Shared secret confirming the spawned process is the intended plugin.
    pub magic_cookie_value: String,
    #[serde(default, rename = "release")]
    pub releases: Vec<Release>,
}

/// One installable build of a plugin for a given OS/arch/version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub os: String,
    pub arch: String,
    pub version: String,
    /// Hex-encoded SHA-256 digest of the exact binary bytes.
    pub sum: String,
}

impl Plugin {
    /// Expected digest for the release matching (os, arch, version).
    ///
    /// Fails with a checksum error before any network or filesystem
    /// activity: on an empty version, a missing release entry, or a sum
    /// that does not decode to exactly 32 bytes.
    pub fn release_digest(&self, os: &str, arch: &str, version: &str) -> Result<[u8; 32]> {
        let checksum_err = |reason: &str| PluginError::Checksum {
            plugin: self.shortname.clone(),
            version: version.to_string(),
            reason: reason.to_string(),
        };

        if version.is_empty() {
            return Err(checksum_err("no version resolved"));
        }

        let sum = self
            .releases
            .iter()
            .find(|r| r.os == os && r.arch == arch && r.version == version)
            .map(|r| r.sum.as_str())
            .ok_or_else(|| checksum_err(&format!("no release entry for {os}/{arch}")))?;

        let raw = hex::decode(sum).map_err(|_| checksum_err("checksum is not valid hex"))?;
        raw.try_into()
            .map_err(|_| checksum_err("checksum does not decode to a 32-byte SHA-256 digest"))
    }
}

/// Loads and refreshes the local manifest cache.
pub struct ManifestStore {
    config: Config,
    hosting: HostingClient,
}

impl ManifestStore {
    pub fn new(config: Config, hosting: HostingClient) -> Self {
        Self { config, hosting }
    }

    /// Load the cached manifest. A missing cache file triggers exactly one
    /// implicit refresh before the read is retried; a second miss surfaces
    /// as a filesystem error.
    pub async fn load(&self) -> Result<Manifest> {
        let path = paths::manifest_path(&self.config);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("plugin manifest missing locally, refreshing");
                self.refresh().await?;
                fs::read(&path)
                    .await
                    .map_err(|err| PluginError::fs(&path, err))?
            }
            Err(err) => return Err(PluginError::fs(&path, err)),
        };

        toml::from_str(&String::from_utf8_lossy(&bytes))
            .map_err(|source| PluginError::Manifest { path, source })
    }

    /// Fetch the manifest body from the hosting source and atomically
    /// replace the local cache file.
    pub async fn refresh(&self) -> Result<()> {
        let base = self.hosting.plugin_base_url().await?;
        let location = join_location(&base, MANIFEST_FILE);
        let body = fetch_resource(self.hosting.http(), &location).await?;

        let path = paths::manifest_path(&self.config);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| PluginError::fs(parent, err))?;
        }

        // Write-then-rename so a concurrent load never sees a torn file.
        let tmp = staging_path(&path);
        fs::write(&tmp, &body)
            .await
            .map_err(|err| PluginError::fs(&tmp, err))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|err| PluginError::fs(&path, err))?;

        info!(path = %path.display(), "plugin manifest refreshed");
        Ok(())
    }

    /// Case-insensitive lookup by shortname.
    pub async fn lookup(&self, name: &str) -> Result<Plugin> {
        let manifest = self.load().await?;
        manifest
            .plugins
            .into_iter()
            .find(|p| p.shortname.eq_ignore_ascii_case(name))
            .ok_or_else(|| PluginError::NotFound(format!("no plugin named '{name}' in the manifest")))
    }
}

fn staging_path(path: &std::path::Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[[plugins]]
shortname = "foo"
binary = "foo-plugin"
magicCookieValue = "sesame"

[[plugins.release]]
os = "linux"
arch = "amd64"
version = "1.2.0"
sum = "a8f5f167f44f4964e6c998dee827110c8b0e25e2a1f53f2f3e2b2a37b0dcd1aa"
"#;

    fn sample_plugin() -> Plugin {
        let manifest: Manifest = toml::from_str(SAMPLE).expect("sample parses");
        manifest.plugins.into_iter().next().expect("one plugin")
    }

    fn store_with_hosting(
        config_root: &std::path::Path,
        hosting_dir: Option<&std::path::Path>,
    ) -> ManifestStore {
        let mut config = test_config(config_root);
        config.plugin_base_url = hosting_dir.map(|d| d.display().to_string());
        let hosting = HostingClient::new(reqwest::Client::new(), config.clone());
        ManifestStore::new(config, hosting)
    }

    #[test]
    fn parses_wire_shape() {
        let plugin = sample_plugin();
        assert_eq!(plugin.shortname, "foo");
        assert_eq!(plugin.binary, "foo-plugin");
        assert_eq!(plugin.magic_cookie_value, "sesame");
        assert_eq!(plugin.releases.len(), 1);
        assert_eq!(plugin.releases[0].version, "1.2.0");
    }

    #[test]
    fn release_digest_decodes_to_32_bytes() {
        let plugin = sample_plugin();
        let digest = plugin
            .release_digest("linux", "amd64", "1.2.0")
            .expect("valid digest");
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn release_digest_rejects_empty_version_and_missing_platform() {
        let plugin = sample_plugin();
        assert!(matches!(
            plugin.release_digest("linux", "amd64", ""),
            Err(PluginError::Checksum { .. })
        ));
        assert!(matches!(
            plugin.release_digest("darwin", "arm64", "1.2.0"),
            Err(PluginError::Checksum { .. })
        ));
    }

    #[test]
    fn release_digest_rejects_malformed_hex() {
        let mut plugin = sample_plugin();
        plugin.releases[0].sum = "zz".repeat(32);
        assert!(matches!(
            plugin.release_digest("linux", "amd64", "1.2.0"),
            Err(PluginError::Checksum { .. })
        ));

        plugin.releases[0].sum = "abcd".to_string();
        assert!(matches!(
            plugin.release_digest("linux", "amd64", "1.2.0"),
            Err(PluginError::Checksum { .. })
        ));
    }

    #[tokio::test]
    async fn load_reads_existing_cache_without_refresh() {
        let temp = tempdir().expect("tempdir");
        tokio::fs::write(temp.path().join(MANIFEST_FILE), SAMPLE)
            .await
            .expect("write cache");

        // No hosting source configured: a refresh attempt would fail.
        let store = store_with_hosting(temp.path(), None);
        let manifest = store.load().await.expect("load");
        assert_eq!(manifest.plugins.len(), 1);
    }

    #[tokio::test]
    async fn missing_cache_triggers_one_refresh() {
        let temp = tempdir().expect("tempdir");
        let hosting = temp.path().join("hosting");
        tokio::fs::create_dir_all(&hosting).await.expect("mkdir");
        tokio::fs::write(hosting.join(MANIFEST_FILE), SAMPLE)
            .await
            .expect("write hosted manifest");

        let config_root = temp.path().join("config");
        let store = store_with_hosting(&config_root, Some(&hosting));

        let manifest = store.load().await.expect("load with implicit refresh");
        assert_eq!(manifest.plugins.len(), 1);
        assert!(config_root.join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn missing_cache_and_missing_source_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let hosting = temp.path().join("nowhere");
        let store = store_with_hosting(temp.path(), Some(&hosting));

        let err = store.load().await.expect_err("no source to refresh from");
        assert!(matches!(err, PluginError::Remote { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unparseable_cache_is_a_manifest_error() {
        let temp = tempdir().expect("tempdir");
        tokio::fs::write(temp.path().join(MANIFEST_FILE), "plugins = 3")
            .await
            .expect("write cache");

        let store = store_with_hosting(temp.path(), None);
        let err = store.load().await.expect_err("parse failure");
        assert!(matches!(err, PluginError::Manifest { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let temp = tempdir().expect("tempdir");
        tokio::fs::write(temp.path().join(MANIFEST_FILE), SAMPLE)
            .await
            .expect("write cache");

        let store = store_with_hosting(temp.path(), None);
        let plugin = store.lookup("FOO").await.expect("lookup");
        assert_eq!(plugin.shortname, "foo");

        let err = store.lookup("bar").await.expect_err("unknown plugin");
        assert!(matches!(err, PluginError::NotFound(_)), "got {err:?}");
    }
}
