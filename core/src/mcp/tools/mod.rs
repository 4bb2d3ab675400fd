//! Tool catalogue exposed through `tools/list` and `tools/call`
//!
//! Each tool implements [`McpTool`]; the [`ToolRegistry`] keeps them in
//! registration order so `tools/list` is stable.

pub mod game;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{KakomcpError, Result};
use crate::game::StatusCallback;

pub use game::{ActionAndNextTurnTool, CreateAiGameTool, GetAiListTool, JoinGameTool, AI_NAMES};

/// Per-call context handed to a tool by the channel
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Session the calling channel is bound to
    pub session_id: Option<String>,
    /// Progress sink, forwarded to the session's event stream
    pub status: Option<StatusCallback>,
    /// Fired when the session's channel closes
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn require_session(&self) -> Result<&str> {
        self.session_id
            .as_deref()
            .ok_or(KakomcpError::SessionIdUnavailable)
    }
}

/// A tool that can be called by an MCP client
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name used in `tools/call`
    fn name(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object
    fn input_schema(&self) -> Value;

    /// JSON schema of `structuredContent`
    fn output_schema(&self) -> Value;

    fn annotations(&self) -> Value {
        json!({ "openWorldHint": false })
    }

    /// Run the tool; the returned value becomes `structuredContent`
    async fn call(&self, arguments: Value, ctx: &ToolContext) -> Result<Value>;

    /// Entry for `tools/list`
    fn definition(&self) -> Value {
        json!({
            "name": self.name(),
            "title": self.title(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
            "outputSchema": self.output_schema(),
            "annotations": self.annotations(),
        })
    }
}

/// Ordered set of tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn McpTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name in place
    pub fn register(&mut self, tool: Arc<dyn McpTool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.definition()).collect()
    }
}

/// Decode tool arguments, naming the tool on failure
pub(crate) fn parse_arguments<T: DeserializeOwned>(tool_name: &str, arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| KakomcpError::InvalidToolArguments {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    })
}

/// `tools/call` result carrying structured content and its text rendering
pub fn tool_success(structured: Value) -> Value {
    json!({
        "content": [{ "type": "text", "text": structured.to_string() }],
        "structuredContent": structured,
    })
}

/// `tools/call` result for a failed tool execution
pub fn tool_failure(error: &KakomcpError) -> Value {
    json!({
        "content": [{ "type": "text", "text": error.to_string() }],
        "isError": true,
    })
}

/// Output schema shared by every tool that returns a game snapshot
pub fn game_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "width": { "type": "number", "description": "Board width" },
            "height": { "type": "number", "description": "Board height" },
            "points": {
                "type": "array",
                "description": "Point value of each square; first index is Y, second is X",
                "items": { "type": "array", "items": { "type": "number" } }
            },
            "tiles": {
                "type": "array",
                "description": "Owner and kind of each square; first index is Y, second is X",
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "player": {
                                "type": ["number", "null"],
                                "description": "Index of the owning player, null for an empty square"
                            },
                            "type": {
                                "type": ["number", "null"],
                                "description": "For an owned square: 0 is area, 1 is wall"
                            }
                        },
                        "required": ["player", "type"]
                    }
                }
            },
            "nAgent": { "type": "number", "description": "Number of agents per player" },
            "nowTurn": { "type": "number", "description": "Current turn" },
            "totalTurn": { "type": "number", "description": "Total number of turns" },
            "turnSec": {
                "type": "number",
                "description": "Seconds per turn; actions must be sent before the turn advances"
            },
            "players": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "agents": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "x": { "type": "number" },
                                    "y": { "type": "number" },
                                    "lastRes": {
                                        "type": ["number", "null"],
                                        "description": "Result of the last action. 0: success, 1: conflict, 2: invalid, 3: several actions for one agent, 4: unknown agent, 5: unknown action"
                                    }
                                },
                                "required": ["x", "y"]
                            }
                        },
                        "point": {
                            "type": "object",
                            "properties": {
                                "areaPoint": { "type": "number" },
                                "wallPoint": { "type": "number" }
                            },
                            "required": ["areaPoint", "wallPoint"]
                        },
                        "isMe": { "type": "boolean", "description": "Whether this player is you" }
                    },
                    "required": ["agents", "point", "isMe"]
                }
            }
        },
        "required": ["width", "height", "points", "tiles", "nAgent", "nowTurn", "totalTurn", "turnSec", "players"]
    })
}
