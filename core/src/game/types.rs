//! Wire types of the Kakomimasu match API
//!
//! Only the fields the bridge reads are modelled; anything else in the API
//! payloads is ignored on decode.

use serde::{Deserialize, Serialize};

/// Lifecycle state reported by "get match"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Free,
    Ready,
    Matching,
    Gaming,
    Ended,
    #[serde(other)]
    Unknown,
}

/// Response of both join operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub game_id: String,
    pub pic: String,
    /// Player index assigned to us in this match
    pub index: usize,
}

/// Parameters for creating a match against a built-in AI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMatchRequest {
    pub guest_name: String,
    pub ai_name: String,
    pub transition_sec: u32,
    pub operation_sec: u32,
    pub board_name: String,
    pub n_agent: u32,
    pub total_turn: u32,
}

/// Which remote "join or create" operation to call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequest {
    /// Create a match against an AI opponent
    Ai(AiMatchRequest),
    /// Join an existing match by id
    GameId { game_id: String, guest_name: String },
}

/// Kind of action an agent performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Put,
    Move,
    Remove,
    None,
}

/// One agent's action for the next turn, as supplied by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAction {
    pub agent_index: usize,
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub x: i32,
    pub y: i32,
}

/// Response of "submit action"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Turn the submitted actions apply to
    pub turn: u32,
}

/// One square of the board. `player` is `None` for an unowned square; for an
/// owned square `type` is 0 for area and 1 for wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    #[serde(default)]
    pub player: Option<usize>,
    #[serde(rename = "type", default)]
    pub kind: Option<u8>,
}

/// Board with row-major flat arrays of `width * height` entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub width: usize,
    pub height: usize,
    pub points: Vec<i32>,
    pub tiles: Vec<Tile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPoint {
    pub area_point: i32,
    pub wall_point: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlayer {
    #[serde(default)]
    pub agents: Vec<AgentPosition>,
    #[serde(default)]
    pub point: PlayerPoint,
}

/// Result of one agent's action in a logged turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLog {
    pub agent_id: usize,
    #[serde(default)]
    pub res: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerTurnLog {
    #[serde(default)]
    pub actions: Vec<ActionLog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnLog {
    #[serde(default)]
    pub players: Vec<PlayerTurnLog>,
}

/// State returned by "get match"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(default)]
    pub id: String,
    pub status: MatchStatus,
    pub turn: u32,
    #[serde(default)]
    pub total_turn: u32,
    #[serde(default)]
    pub n_agent: u32,
    #[serde(default)]
    pub transition_sec: u32,
    #[serde(default)]
    pub operation_sec: u32,
    #[serde(default)]
    pub field: Option<Field>,
    #[serde(default)]
    pub players: Vec<MatchPlayer>,
    #[serde(default)]
    pub log: Vec<TurnLog>,
}
