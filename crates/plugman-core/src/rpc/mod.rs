//! Parent/child plugin channel.
//!
//! Newline-delimited JSON over a duplex byte stream: one handshake line
//! from the plugin, then JSON-RPC 2.0 request/response envelopes. The
//! transport is stream-generic so the full client can be exercised over
//! in-memory pipes; production wires it to the child's stdin/stdout.

mod client;
mod protocol;
mod transport;

pub use client::PluginClient;
pub use protocol::{
    Handshake, RpcError, RpcRequest, RpcResponse, RunCommandParams, RunCommandResult,
    MAIN_INTERFACE, RUN_COMMAND_METHOD,
};
pub use transport::Transport;
