//! MCP server core
//!
//! Dispatches JSON-RPC requests to the shared command layer. Tool failures
//! become `isError` results, protocol failures become JSON-RPC errors; the
//! serve loop itself never crashes on a bad request.

use serde_json::Value;

use crate::commands::CommandContext;

use super::tools;
use super::types::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfoPayload,
    ToolsCapability, INTERNAL_ERROR, METHOD_NOT_FOUND,
};

/// MCP protocol version we answer `initialize` with.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub struct McpServer {
    pub(crate) context: CommandContext,
}

impl McpServer {
    pub fn new(context: CommandContext) -> Self {
        McpServer { context }
    }

    /// Handle one request. Notifications (no id) return `None`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "initialized" | "notifications/initialized" => Ok(Value::Null),
            "ping" => Ok(Value::Object(Default::default())),
            "tools/list" => tools::handle_tools_list(),
            "tools/call" => tools::handle_tools_call(&self.context, request.params).await,
            other => {
                if is_notification {
                    tracing::debug!(method = other, "Ignoring unknown notification");
                    return None;
                }
                return Some(JsonRpcResponse::failure(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("Unknown method: {other}"),
                ));
            }
        };

        if is_notification {
            return None;
        }
        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(response) => match response {
                tools::DispatchError::Protocol { code, message } => {
                    JsonRpcResponse::failure(request.id, code, message)
                }
                tools::DispatchError::Internal(message) => {
                    JsonRpcResponse::failure(request.id, INTERNAL_ERROR, message)
                }
            },
        })
    }

    fn handle_initialize(&self) -> Result<Value, tools::DispatchError> {
        let info = self.context.server_info();
        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfoPayload {
                name: info.name.into(),
                version: info.version.into(),
            },
        };
        serde_json::to_value(result)
            .map_err(|e| tools::DispatchError::Internal(e.to_string()))
    }
}
