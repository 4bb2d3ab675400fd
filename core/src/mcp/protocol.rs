//! JSON-RPC 2.0 message types for the Model Context Protocol

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::KakomcpError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Header carrying the session identifier in both directions
pub const SESSION_HEADER: &str = "mcp-session-id";

pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// JSON-RPC error codes
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Server-defined: missing or invalid session
    pub const SESSION_ERROR: i64 = -32000;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::PARSE_ERROR, format!("Parse error: {}", detail))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::new(codes::SESSION_ERROR, message)
    }
}

/// Response object; exactly one of `result` and `error` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({"jsonrpc": JSONRPC_VERSION, "id": null}))
    }
}

/// A client message after classification
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// Reply to a server-initiated request; accepted and ignored
    Response,
}

impl IncomingMessage {
    /// Classify one JSON value. On failure returns the id (if any) to answer with.
    pub fn parse(value: Value) -> Result<Self, (Value, JsonRpcError)> {
        let Value::Object(mut object) = value else {
            return Err((Value::Null, JsonRpcError::invalid_request("Invalid Request: not an object")));
        };

        let id = object.remove("id");
        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err((
                id.unwrap_or(Value::Null),
                JsonRpcError::invalid_request("Invalid Request: jsonrpc must be \"2.0\""),
            ));
        }

        match object.remove("method") {
            Some(Value::String(method)) => {
                let params = object.remove("params");
                match id {
                    Some(id) => Ok(Self::Request { id, method, params }),
                    None => Ok(Self::Notification { method, params }),
                }
            }
            Some(_) => Err((
                id.unwrap_or(Value::Null),
                JsonRpcError::invalid_request("Invalid Request: method must be a string"),
            )),
            None if object.contains_key("result") || object.contains_key("error") => {
                Ok(Self::Response)
            }
            None => Err((
                id.unwrap_or(Value::Null),
                JsonRpcError::invalid_request("Invalid Request: missing method"),
            )),
        }
    }

    pub fn is_initialize(&self) -> bool {
        matches!(self, Self::Request { method, .. } if method == "initialize")
    }
}

/// Whether a parsed body is a single `initialize` request
pub fn is_initialize_request(body: &Value) -> bool {
    body.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION)
        && body.get("method").and_then(Value::as_str) == Some("initialize")
        && body.get("id").is_some()
}

/// Body sent when no session can be associated with a request
pub fn session_rejection() -> Value {
    JsonRpcResponse::failure(
        Value::Null,
        JsonRpcError::session(KakomcpError::ProtocolSession.to_string()),
    )
    .to_value()
}

/// Server-to-client notification
pub fn notification(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

/// Protocol version to answer an `initialize` with
pub fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}
