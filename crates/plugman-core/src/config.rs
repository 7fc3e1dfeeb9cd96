//! Runtime configuration.
//!
//! Built once from the environment and threaded explicitly through every
//! constructor. No component reads process-global state on its own.

use std::path::PathBuf;

/// Version marker used when the development override is active. Dev builds
/// are not listed in the manifest, so they carry no resolvable version.
pub const DEV_VERSION: &str = "master";

/// Fixed handshake protocol version spoken with plugin binaries.
pub const PROTOCOL_VERSION: u32 = 1;

const DEFAULT_API_BASE: &str = "https://api.plugman.dev";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `plugins.toml` and the default install root.
    pub config_root: PathBuf,
    /// `PLUGINS_PATH` override. When set, plugins run from here at the
    /// fixed [`DEV_VERSION`] marker and digest pinning is skipped.
    pub install_override: Option<PathBuf>,
    /// Base URL of the authenticated plugin-metadata endpoint.
    pub api_base_url: String,
    /// Opaque credential for the metadata endpoint. Profile loading lives
    /// outside this crate; the key arrives here already resolved.
    pub api_key: Option<String>,
    /// Artifact base override. When set, the metadata endpoint is never
    /// consulted. A non-HTTP value is treated as a local directory.
    pub plugin_base_url: Option<String>,
    /// Platform the manifest's release entries are matched against.
    pub os: String,
    pub arch: String,
}

impl Config {
    /// Read the environment once. `XDG_CONFIG_HOME` relocates the config
    /// root; `PLUGINS_PATH` switches on the development override.
    pub fn from_env() -> Self {
        let config_root = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            })
            .join("plugman");

        let install_override = std::env::var_os("PLUGINS_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            config_root,
            install_override,
            api_base_url: std::env::var("PLUGMAN_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            api_key: std::env::var("PLUGMAN_API_KEY").ok(),
            plugin_base_url: std::env::var("PLUGMAN_PLUGIN_BASE_URL").ok(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    pub fn dev_mode(&self) -> bool {
        self.install_override.is_some()
    }
}

#[cfg(test)]
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    Config {
        config_root: root.to_path_buf(),
        install_override: None,
        api_base_url: DEFAULT_API_BASE.to_string(),
        api_key: None,
        plugin_base_url: None,
        os: "linux".to_string(),
        arch: "amd64".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_mode_follows_install_override() {
        let mut config = test_config(std::path::Path::new("/tmp"));
        assert!(!config.dev_mode());
        config.install_override = Some(PathBuf::from("/tmp/dev-plugins"));
        assert!(config.dev_mode());
    }
}
