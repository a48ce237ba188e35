//! MCP server surface
//!
//! JSON-RPC 2.0 over line-delimited stdio. The tools here are thin wrappers
//! over [`crate::commands`]: no transport code in the tools, no tool logic
//! in the transport.

mod server;
mod stdio;
mod tools;
pub mod types;

pub use server::McpServer;
pub use stdio::serve_stdio;
pub use types::{JsonRpcRequest, JsonRpcResponse};
