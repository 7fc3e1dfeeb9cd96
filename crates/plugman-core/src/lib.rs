//! plugman-core: verified plugin lifecycle management.
//!
//! Resolves which release of an externally distributed plugin binary should
//! run on this machine, downloads and SHA-256-verifies it, installs it under
//! a stable layout, launches it as a child process behind a magic-cookie
//! handshake, and proxies a single command invocation over JSON-RPC.

pub mod config;
pub mod error;
pub mod hosting;
pub mod installer;
pub mod launcher;
pub mod manifest;
pub mod paths;
pub mod rpc;
pub mod runner;
pub mod version;

pub use config::Config;
pub use error::{PluginError, Result};
