//! MCP method dispatch
//!
//! [`McpServer`] is shared by every channel; per-channel state (the bound
//! session id and its notification sink) arrives through [`ToolContext`].

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::protocol::{negotiate_version, IncomingMessage, JsonRpcError, JsonRpcResponse};
use super::tools::{tool_failure, tool_success, ToolContext, ToolRegistry};
use crate::error::KakomcpError;

pub const SERVER_NAME: &str = "kakomimasu-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct McpServer {
    tools: ToolRegistry,
    instructions: Option<String>,
}

impl McpServer {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle one classified message. Requests get a response, everything
    /// else gets `None`.
    pub async fn dispatch(&self, message: IncomingMessage, ctx: &ToolContext) -> Option<JsonRpcResponse> {
        match message {
            IncomingMessage::Request { id, method, params } => {
                let outcome = self.handle_request(&method, params, ctx).await;
                Some(match outcome {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(error) => {
                        debug!(method = %method, code = error.code, "request failed");
                        JsonRpcResponse::failure(id, error)
                    }
                })
            }
            IncomingMessage::Notification { method, .. } => {
                debug!(method = %method, "notification received");
                None
            }
            IncomingMessage::Response => None,
        }
    }

    async fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &ToolContext,
    ) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => Ok(self.initialize_result(params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.definitions() })),
            "tools/call" => self.call_tool(params, ctx).await,
            "logging/setLevel" => Ok(json!({})),
            _ => Err(JsonRpcError::method_not_found(method)),
        }
    }

    fn initialize_result(&self, params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let mut result = json!({
            "protocolVersion": negotiate_version(requested),
            "capabilities": {
                "tools": { "listChanged": false },
                "logging": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        });
        if let Some(instructions) = &self.instructions {
            result["instructions"] = json!(instructions);
        }
        result
    }

    async fn call_tool(&self, params: Option<Value>, ctx: &ToolContext) -> Result<Value, JsonRpcError> {
        let params = params.unwrap_or(Value::Null);
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("tools/call requires a tool name"))?;

        let Some(tool) = self.tools.get(name) else {
            let error = KakomcpError::ToolNotFound {
                tool_name: name.to_string(),
            };
            return Err(JsonRpcError::invalid_params(error.to_string()));
        };

        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        match tool.call(arguments, ctx).await {
            Ok(structured) => Ok(tool_success(structured)),
            Err(error) => {
                if error.is_precondition() {
                    debug!(tool = name, session_id = ?ctx.session_id, error = %error, "tool called before session was ready");
                } else if matches!(error, KakomcpError::SessionClosed { .. }) {
                    debug!(tool = name, session_id = ?ctx.session_id, "tool call abandoned, session closed");
                } else {
                    warn!(tool = name, session_id = ?ctx.session_id, error = %error, "tool call failed");
                }
                Ok(tool_failure(&error))
            }
        }
    }
}
