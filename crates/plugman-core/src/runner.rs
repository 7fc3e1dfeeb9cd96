//! Top-level run orchestration.
//!
//! Walks one invocation through
//! `NotInstalled → Installing → Installed → Launching → Ready → Dispatching
//! → Terminated`, with the child torn down on every terminal path.

use semver::Version;
use tokio::fs;
use tracing::{debug, info};

use crate::config::{Config, DEV_VERSION};
use crate::error::{PluginError, Result};
use crate::hosting::HostingClient;
use crate::installer::Installer;
use crate::launcher::Launcher;
use crate::manifest::{ManifestStore, Plugin};
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    NotInstalled,
    Installing,
    Installed,
    Launching,
    Ready,
    Dispatching,
    Terminated,
}

fn enter(phase: RunPhase) {
    debug!(?phase, "run state");
}

pub struct Runner {
    config: Config,
    store: ManifestStore,
    installer: Installer,
    launcher: Launcher,
}

impl Runner {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        let hosting = HostingClient::new(http, config.clone());
        Self {
            store: ManifestStore::new(config.clone(), hosting.clone()),
            installer: Installer::new(config.clone(), hosting),
            launcher: Launcher::new(config.clone()),
            config,
        }
    }

    /// Run one plugin invocation end to end and return the command output.
    pub async fn run(&self, name: &str, argv: &[String]) -> Result<String> {
        let plugin = self.store.lookup(name).await?;

        let (version, installed_this_run) = self.select_version(&plugin).await?;

        enter(RunPhase::Launching);
        let mut client = match self.launcher.launch(&plugin, &version).await {
            Ok(client) => client,
            // Resolved to an installed version but the binary is gone:
            // exactly one on-demand install, then one launch retry.
            Err(err)
                if err.is_missing_file() && !installed_this_run && !self.config.dev_mode() =>
            {
                info!(%version, "installed binary missing on disk, reinstalling");
                enter(RunPhase::Installing);
                self.installer.install(&plugin, &version).await?;
                enter(RunPhase::Launching);
                self.launcher.launch(&plugin, &version).await?
            }
            Err(err) => return Err(err),
        };
        enter(RunPhase::Ready);

        enter(RunPhase::Dispatching);
        let result = client.run_command(argv).await;

        // Terminal state tears the child down whether dispatch succeeded
        // or not.
        client.shutdown().await;
        enter(RunPhase::Terminated);

        result
    }

    /// Decide which version to launch. Development override pins the fixed
    /// dev marker and never touches the install tree scan; otherwise an
    /// already-installed version wins, and only a cold machine resolves
    /// and installs the latest release.
    async fn select_version(&self, plugin: &Plugin) -> Result<(String, bool)> {
        if self.config.dev_mode() {
            debug!(version = DEV_VERSION, "development override pins version");
            return Ok((DEV_VERSION.to_string(), false));
        }

        if let Some(version) = self.installed_version(plugin).await? {
            enter(RunPhase::Installed);
            debug!(%version, "found installed version");
            return Ok((version, false));
        }

        enter(RunPhase::NotInstalled);
        let version = plugin
            .resolve_version(&self.config.os, &self.config.arch)
            .ok_or_else(|| {
                PluginError::NotFound(format!(
                    "plugin '{}' has no release for {}/{}",
                    plugin.shortname, self.config.os, self.config.arch
                ))
            })?;

        enter(RunPhase::Installing);
        self.installer.install(plugin, &version).await?;
        enter(RunPhase::Installed);
        Ok((version, true))
    }

    /// Scan `<install-root>/<shortname>` for version directories, picking
    /// the newest when several builds linger from past installs.
    async fn installed_version(&self, plugin: &Plugin) -> Result<Option<String>> {
        let dir = paths::install_root(&self.config).join(&plugin.shortname);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PluginError::fs(&dir, err)),
        };

        let mut best: Option<(Version, String)> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| PluginError::fs(&dir, err))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if let Ok(parsed) = Version::parse(&name) {
                if best.as_ref().map_or(true, |(current, _)| parsed > *current) {
                    best = Some((parsed, name));
                }
            }
        }

        Ok(best.map(|(_, name)| name))
    }
}
