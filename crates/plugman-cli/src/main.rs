//! plugman: install and run verified CLI plugins.
//!
//! Thin binary over `plugman-core`: argument parsing, logging setup, and
//! the interrupt race around `run` live here; everything else is the
//! library's job.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plugman_core::hosting::HostingClient;
use plugman_core::installer::Installer;
use plugman_core::manifest::ManifestStore;
use plugman_core::runner::Runner;
use plugman_core::{Config, PluginError};

#[derive(Parser)]
#[command(name = "plugman")]
#[command(about = "Install and run verified CLI plugins", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the local plugin manifest from the hosting source
    Refresh,

    /// List the plugins available in the manifest
    List,

    /// Download, verify, and install a plugin
    Install {
        /// Plugin shortname as listed in the manifest
        name: String,
        /// Install a specific version instead of the latest
        #[arg(long)]
        version: Option<String>,
    },

    /// Run a plugin, forwarding the remaining arguments to it
    Run {
        /// Plugin shortname as listed in the manifest
        name: String,
        /// Arguments handed to the plugin unchanged
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let http = reqwest::Client::new();

    match cli.command {
        Commands::Refresh => {
            let store = manifest_store(&config, &http);
            store.refresh().await?;
            println!("Plugin manifest refreshed.");
        }
        Commands::List => {
            let store = manifest_store(&config, &http);
            let manifest = store.load().await?;
            if manifest.plugins.is_empty() {
                println!("No plugins available.");
            }
            for plugin in manifest.plugins {
                let latest = plugin
                    .resolve_version(&config.os, &config.arch)
                    .unwrap_or_else(|| "unsupported on this platform".to_string());
                println!("{:<20} {latest}", plugin.shortname);
            }
        }
        Commands::Install { name, version } => {
            let store = manifest_store(&config, &http);
            let plugin = store.lookup(&name).await?;

            let version = match version {
                Some(version) => version,
                None => plugin
                    .resolve_version(&config.os, &config.arch)
                    .ok_or_else(|| {
                        anyhow!(
                            "plugin '{name}' has no release for {}/{}",
                            config.os,
                            config.arch
                        )
                    })?,
            };

            let hosting = HostingClient::new(http.clone(), config.clone());
            let installer = Installer::new(config.clone(), hosting);
            let path = installer
                .install(&plugin, &version)
                .await
                .with_context(|| format!("failed to install '{name}' {version}"))?;
            println!("Installed {name} {version} to {}", path.display());
        }
        Commands::Run { name, args } => {
            let runner = Runner::new(config, http);

            // Racing against ctrl-c drops the in-flight run future, and
            // with it the child handle, which kills the plugin process
            // before we exit, even mid-handshake or mid-dispatch.
            let output = tokio::select! {
                result = runner.run(&name, &args) => result?,
                _ = tokio::signal::ctrl_c() => {
                    return Err(PluginError::Interrupted.into());
                }
            };

            if !output.is_empty() {
                println!("{output}");
            }
        }
    }

    Ok(())
}

fn manifest_store(config: &Config, http: &reqwest::Client) -> ManifestStore {
    let hosting = HostingClient::new(http.clone(), config.clone());
    ManifestStore::new(config.clone(), hosting)
}
