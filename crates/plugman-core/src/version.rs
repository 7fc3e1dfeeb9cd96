//! Release selection by semantic version.
//!
//! The manifest's list order carries no meaning: the latest version is
//! chosen by parsed comparison, and entries that fail to parse are skipped
//! with a warning rather than trusted by position.

use semver::Version;
use tracing::warn;

use crate::manifest::{Plugin, Release};

impl Plugin {
    /// Latest installable version for this platform, or `None` when no
    /// release matches. An empty result means "unsupported platform", not
    /// an error.
    pub fn resolve_version(&self, os: &str, arch: &str) -> Option<String> {
        latest_matching(&self.releases, os, arch).map(|r| r.version.clone())
    }
}

fn latest_matching<'a>(releases: &'a [Release], os: &str, arch: &str) -> Option<&'a Release> {
    let mut best: Option<(Version, &Release)> = None;

    for release in releases.iter().filter(|r| r.os == os && r.arch == arch) {
        match Version::parse(&release.version) {
            Ok(parsed) => {
                if best.as_ref().map_or(true, |(current, _)| parsed > *current) {
                    best = Some((parsed, release));
                }
            }
            Err(err) => {
                warn!(
                    version = %release.version,
                    %err,
                    "skipping release with unparseable version"
                );
            }
        }
    }

    best.map(|(_, release)| release)
}
