//! Centralized filesystem layout.
//!
//! Every path the subsystem touches is derived here from the injected
//! [`Config`], in one place for consistency.

use std::path::PathBuf;

use crate::config::Config;

/// Local manifest cache: `<config-root>/plugins.toml`.
pub fn manifest_path(config: &Config) -> PathBuf {
    config.config_root.join("plugins.toml")
}

/// Root of the install tree: `PLUGINS_PATH` when overridden, else
/// `<config-root>/plugins`.
pub fn install_root(config: &Config) -> PathBuf {
    match &config.install_override {
        Some(root) => root.clone(),
        None => config.config_root.join("plugins"),
    }
}

/// Version directory for one plugin: `<install-root>/<shortname>/<version>`.
pub fn plugin_dir(config: &Config, shortname: &str, version: &str) -> PathBuf {
    install_root(config).join(shortname).join(version)
}

/// Installed binary: `<install-root>/<shortname>/<version>/<binary>`.
pub fn plugin_binary(config: &Config, shortname: &str, version: &str, binary: &str) -> PathBuf {
    plugin_dir(config, shortname, version).join(binary)
}
