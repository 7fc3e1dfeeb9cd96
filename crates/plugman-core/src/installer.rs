//! Plugin binary installation.
//!
//! Ordering is the whole point here: the expected digest is resolved and
//! decoded before any network access, and the downloaded bytes are verified
//! before anything touches the install tree.

use std::path::PathBuf;

use sha2::{Digest as _, Sha256};
use tokio::fs;
use tracing::info;

use crate::config::Config;
use crate::error::{PluginError, Result};
use crate::hosting::{fetch_resource, join_location, HostingClient};
use crate::manifest::Plugin;
use crate::paths;

pub struct Installer {
    config: Config,
    hosting: HostingClient,
}

impl Installer {
    pub fn new(config: Config, hosting: HostingClient) -> Self {
        Self { config, hosting }
    }

    /// Download, verify, and persist one release. Returns the installed
    /// binary path.
    pub async fn install(&self, plugin: &Plugin, version: &str) -> Result<PathBuf> {
        let expected = plugin.release_digest(&self.config.os, &self.config.arch, version)?;

        let base = self.hosting.plugin_base_url().await?;
        let location = join_location(
            &base,
            &format!(
                "{}/{}/{}/{}/{}",
                plugin.shortname, version, self.config.os, self.config.arch, plugin.binary
            ),
        );

        info!(plugin = %plugin.shortname, %version, %location, "downloading plugin binary");
        let bytes = fetch_resource(self.hosting.http(), &location).await?;

        let actual = Sha256::digest(&bytes);
        if !digests_match(actual.as_slice(), &expected) {
            return Err(PluginError::Integrity {
                plugin: plugin.shortname.clone(),
                version: version.to_string(),
            });
        }

        let dir = paths::plugin_dir(&self.config, &plugin.shortname, version);
        fs::create_dir_all(&dir)
            .await
            .map_err(|err| PluginError::fs(&dir, err))?;

        let target = paths::plugin_binary(&self.config, &plugin.shortname, version, &plugin.binary);

        // Stage next to the target and rename into place, so a concurrent
        // install never exposes a torn binary.
        let staged = dir.join(format!(".{}.partial", plugin.binary));
        fs::write(&staged, &bytes)
            .await
            .map_err(|err| PluginError::fs(&staged, err))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|err| PluginError::fs(&staged, err))?;
        }

        fs::rename(&staged, &target)
            .await
            .map_err(|err| PluginError::fs(&target, err))?;

        info!(path = %target.display(), "plugin installed");
        Ok(target)
    }
}

/// Full-width digest comparison with no early exit.
pub(crate) fn digests_match(actual: &[u8], expected: &[u8; 32]) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::manifest::Release;
    use tempfile::tempdir;

    const BODY: &[u8] = b"#!/bin/sh\necho plugin\n";

    fn plugin_with_sum(sum: String) -> Plugin {
        Plugin {
            shortname: "foo".to_string(),
            binary: "foo-plugin".to_string(),
            magic_cookie_value: "sesame".to_string(),
            releases: vec![Release {
                os: "linux".to_string(),
                arch: "amd64".to_string(),
                version: "1.2.0".to_string(),
                sum,
            }],
        }
    }

    fn sha256_hex(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    fn installer_with_hosting(
        root: &std::path::Path,
        hosting: &std::path::Path,
    ) -> Installer {
        let mut config = test_config(root);
        config.plugin_base_url = Some(hosting.display().to_string());
        let hosting = HostingClient::new(reqwest::Client::new(), config.clone());
        Installer::new(config, hosting)
    }

    async fn host_release(hosting_root: &std::path::Path, bytes: &[u8]) {
        let dir = hosting_root.join("foo/1.2.0/linux/amd64");
        fs::create_dir_all(&dir).await.expect("hosting layout");
        fs::write(dir.join("foo-plugin"), bytes)
            .await
            .expect("host artifact");
    }

    #[tokio::test]
    async fn round_trip_install_rehashes_to_manifest_sum() {
        let temp = tempdir().expect("tempdir");
        let hosting_root = temp.path().join("hosting");
        host_release(&hosting_root, BODY).await;

        let installer = installer_with_hosting(temp.path(), &hosting_root);
        let plugin = plugin_with_sum(sha256_hex(BODY));

        let installed = installer.install(&plugin, "1.2.0").await.expect("install");
        assert_eq!(
            installed,
            temp.path().join("plugins/foo/1.2.0/foo-plugin")
        );

        let on_disk = fs::read(&installed).await.expect("read installed");
        assert_eq!(sha256_hex(&on_disk), plugin.releases[0].sum);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&installed)
                .await
                .expect("metadata")
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn integrity_mismatch_persists_nothing() {
        let temp = tempdir().expect("tempdir");
        let hosting_root = temp.path().join("hosting");
        host_release(&hosting_root, BODY).await;

        let installer = installer_with_hosting(temp.path(), &hosting_root);
        let plugin = plugin_with_sum(sha256_hex(b"different bytes"));

        let err = installer
            .install(&plugin, "1.2.0")
            .await
            .expect_err("digest mismatch");
        assert!(matches!(err, PluginError::Integrity { .. }), "got {err:?}");

        let target = temp.path().join("plugins/foo/1.2.0/foo-plugin");
        assert!(!target.exists(), "nothing may be written on mismatch");
        assert!(!temp.path().join("plugins/foo").exists());
    }

    #[tokio::test]
    async fn empty_version_fails_before_any_fetch() {
        let temp = tempdir().expect("tempdir");
        // Hosting root deliberately absent: any fetch attempt would surface
        // as a remote error instead of a checksum error.
        let installer =
            installer_with_hosting(temp.path(), &temp.path().join("nowhere"));
        let plugin = plugin_with_sum(sha256_hex(BODY));

        let err = installer
            .install(&plugin, "")
            .await
            .expect_err("empty version");
        assert!(matches!(err, PluginError::Checksum { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_sum_fails_before_any_fetch() {
        let temp = tempdir().expect("tempdir");
        let installer =
            installer_with_hosting(temp.path(), &temp.path().join("nowhere"));
        let plugin = plugin_with_sum("feedface".to_string());

        let err = installer
            .install(&plugin, "1.2.0")
            .await
            .expect_err("short sum");
        assert!(matches!(err, PluginError::Checksum { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_artifact_is_a_remote_error() {
        let temp = tempdir().expect("tempdir");
        let hosting_root = temp.path().join("hosting");
        fs::create_dir_all(&hosting_root).await.expect("mkdir");

        let installer = installer_with_hosting(temp.path(), &hosting_root);
        let plugin = plugin_with_sum(sha256_hex(BODY));

        let err = installer
            .install(&plugin, "1.2.0")
            .await
            .expect_err("no artifact hosted");
        assert!(matches!(err, PluginError::Remote { .. }), "got {err:?}");
    }

    #[test]
    fn digest_compare_is_full_width() {
        let expected = [0u8; 32];
        assert!(digests_match(&[0u8; 32], &expected));
        let mut tweaked = [0u8; 32];
        tweaked[31] = 1;
        assert!(!digests_match(&tweaked, &expected));
        assert!(!digests_match(&[0u8; 31], &expected));
    }
}
