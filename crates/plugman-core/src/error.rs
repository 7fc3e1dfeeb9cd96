//! Error taxonomy for the plugin lifecycle.
//!
//! Every failure class a caller may need to distinguish gets its own
//! variant; nothing is swallowed on the way up to the CLI.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = PluginError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PluginError {
    /// Plugin absent from the manifest, or no release for this platform.
    #[error("{0}")]
    NotFound(String),

    /// The manifest file was read but could not be parsed.
    #[error("plugin manifest at {path} could not be parsed: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No expected digest could be determined for a release. Raised before
    /// any network access.
    #[error("no usable checksum for plugin '{plugin}' version '{version}': {reason}")]
    Checksum {
        plugin: String,
        version: String,
        reason: String,
    },

    /// Downloaded bytes failed digest verification. Nothing was persisted.
    #[error("downloaded binary for plugin '{plugin}' version '{version}' failed verification; nothing was installed")]
    Integrity { plugin: String, version: String },

    /// Directory/file create, write, or permission failure.
    #[error("filesystem operation failed on {path}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Handshake or channel failure talking to the plugin process.
    #[error("plugin channel failure: {0}")]
    Protocol(String),

    /// Network fetch failure (manifest, metadata, or artifact).
    #[error("remote fetch failed for {url}: {reason}")]
    Remote { url: String, reason: String },

    /// Error reported by the plugin's own command execution, passed through
    /// verbatim.
    #[error("{0}")]
    UpstreamCommand(String),

    /// The invocation was cancelled by an interrupt signal.
    #[error("interrupted")]
    Interrupted,
}

impl PluginError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying cause is a missing file, which the runner
    /// treats as "not installed yet" rather than a hard failure.
    pub fn is_missing_file(&self) -> bool {
        matches!(
            self,
            Self::Filesystem { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
