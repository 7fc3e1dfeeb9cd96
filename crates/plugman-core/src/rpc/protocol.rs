//! Wire format (JSON-RPC 2.0 plus the startup handshake line).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single logical interface every plugin exposes.
pub const MAIN_INTERFACE: &str = "main";

/// Method dispatching one CLI invocation on the main interface.
pub const RUN_COMMAND_METHOD: &str = "main/run_command";

/// First line the plugin writes after spawning:
/// `{"protocol_version":1,"cookie":"...","interfaces":["main"]}`.
#[derive(Debug, Deserialize)]
pub struct Handshake {
    pub protocol_version: u32,
    /// Echo of the shared secret delivered via `plugin_<shortname>`.
    pub cookie: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    pub id: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RunCommandParams {
    pub argv: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunCommandResult {
    #[serde(default)]
    pub output: String,
}
