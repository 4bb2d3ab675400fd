//! Kakomimasu game tools

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{game_output_schema, parse_arguments, McpTool, ToolContext};
use crate::config::AiMatchConfig;
use crate::error::{KakomcpError, Result};
use crate::game::{AgentAction, AiMatchRequest, JoinRequest, TurnSyncEngine};

/// Built-in AI opponents offered by the match service
pub const AI_NAMES: [&str; 5] = ["a1", "a2", "a3", "a4", "none"];

/// `get-ai-list`
pub struct GetAiListTool;

#[async_trait]
impl McpTool for GetAiListTool {
    fn name(&self) -> &'static str {
        "get-ai-list"
    }

    fn title(&self) -> &'static str {
        "AI list"
    }

    fn description(&self) -> &'static str {
        "Lists the AI opponents available for create-ai-game"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "aiNameList": { "type": "array", "items": { "type": "string" }, "description": "AI names" }
            },
            "required": ["aiNameList"]
        })
    }

    fn annotations(&self) -> Value {
        json!({ "readOnlyHint": true, "openWorldHint": false })
    }

    async fn call(&self, _arguments: Value, _ctx: &ToolContext) -> Result<Value> {
        Ok(json!({ "aiNameList": AI_NAMES }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAiGameArgs {
    name: String,
    ai_name: String,
}

/// `create-ai-game`
pub struct CreateAiGameTool {
    engine: Arc<TurnSyncEngine>,
    board: AiMatchConfig,
}

impl CreateAiGameTool {
    pub fn new(engine: Arc<TurnSyncEngine>, board: AiMatchConfig) -> Self {
        Self { engine, board }
    }
}

#[async_trait]
impl McpTool for CreateAiGameTool {
    fn name(&self) -> &'static str {
        "create-ai-game"
    }

    fn title(&self) -> &'static str {
        "Play against AI"
    }

    fn description(&self) -> &'static str {
        "Creates a match against an AI opponent and waits until it starts"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Your player name" },
                "aiName": {
                    "type": "string",
                    "enum": AI_NAMES,
                    "description": "Opponent AI name, as returned by get-ai-list"
                }
            },
            "required": ["name", "aiName"]
        })
    }

    fn output_schema(&self) -> Value {
        game_output_schema()
    }

    async fn call(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: CreateAiGameArgs = parse_arguments(self.name(), arguments)?;
        if !AI_NAMES.contains(&args.ai_name.as_str()) {
            return Err(KakomcpError::InvalidToolArguments {
                tool_name: self.name().to_string(),
                reason: format!("unknown aiName '{}'", args.ai_name),
            });
        }
        let session_id = ctx.require_session()?;

        let request = JoinRequest::Ai(AiMatchRequest {
            guest_name: args.name,
            ai_name: args.ai_name,
            transition_sec: self.board.transition_sec,
            operation_sec: self.board.operation_sec,
            board_name: self.board.board_name.clone(),
            n_agent: self.board.n_agent,
            total_turn: self.board.total_turn,
        });
        let snapshot = self
            .engine
            .match_join(session_id, &request, ctx.status.as_ref(), &ctx.cancel)
            .await?;
        Ok(serde_json::to_value(snapshot)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinGameArgs {
    name: String,
    game_id: Uuid,
}

/// `join-game`
pub struct JoinGameTool {
    engine: Arc<TurnSyncEngine>,
}

impl JoinGameTool {
    pub fn new(engine: Arc<TurnSyncEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl McpTool for JoinGameTool {
    fn name(&self) -> &'static str {
        "join-game"
    }

    fn title(&self) -> &'static str {
        "Join by game ID"
    }

    fn description(&self) -> &'static str {
        "Joins the match with the given game ID and waits until it starts"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Your player name" },
                "gameId": { "type": "string", "format": "uuid", "description": "ID of the match to join" }
            },
            "required": ["name", "gameId"]
        })
    }

    fn output_schema(&self) -> Value {
        game_output_schema()
    }

    async fn call(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: JoinGameArgs = parse_arguments(self.name(), arguments)?;
        let session_id = ctx.require_session()?;

        let request = JoinRequest::GameId {
            game_id: args.game_id.to_string(),
            guest_name: args.name,
        };
        let snapshot = self
            .engine
            .match_join(session_id, &request, ctx.status.as_ref(), &ctx.cancel)
            .await?;
        Ok(serde_json::to_value(snapshot)?)
    }
}

#[derive(Debug, Deserialize)]
struct ActionArgs {
    actions: Vec<AgentAction>,
}

/// `action-and-nextturn`
pub struct ActionAndNextTurnTool {
    engine: Arc<TurnSyncEngine>,
}

impl ActionAndNextTurnTool {
    pub fn new(engine: Arc<TurnSyncEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl McpTool for ActionAndNextTurnTool {
    fn name(&self) -> &'static str {
        "action-and-nextturn"
    }

    fn title(&self) -> &'static str {
        "Send actions and advance the turn"
    }

    fn description(&self) -> &'static str {
        "Sends the actions for the next turn and returns the board once the turn has advanced"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "actions": {
                    "type": "array",
                    "description": "Actions for the next turn; at most one per agent",
                    "items": {
                        "type": "object",
                        "properties": {
                            "agentIndex": {
                                "type": "number",
                                "description": "Index of the agent, from 0 to nAgent-1"
                            },
                            "type": {
                                "type": "string",
                                "enum": ["PUT", "MOVE", "REMOVE", "NONE"],
                                "description": "PUT places the agent on x,y (not on a wall). MOVE moves one square in any of 8 directions (not onto an opponent wall). REMOVE removes the wall on x,y. NONE does nothing and ignores x,y."
                            },
                            "x": { "type": "number", "description": "Target X coordinate" },
                            "y": { "type": "number", "description": "Target Y coordinate" }
                        },
                        "required": ["agentIndex", "type", "x", "y"]
                    }
                }
            },
            "required": ["actions"]
        })
    }

    fn output_schema(&self) -> Value {
        game_output_schema()
    }

    async fn call(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ActionArgs = parse_arguments(self.name(), arguments)?;
        let session_id = ctx.require_session()?;
        let snapshot = self
            .engine
            .action_submit(session_id, &args.actions, ctx.status.as_ref(), &ctx.cancel)
            .await?;
        Ok(serde_json::to_value(snapshot)?)
    }
}
