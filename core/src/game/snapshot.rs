//! Client-facing view of a match
//!
//! The API exposes the board as flat row-major arrays; clients get nested
//! `[y][x]` grids, the last action result of every agent and an `isMe` flag.

use serde::Serialize;

use super::types::{Match, PlayerPoint, Tile};
use crate::error::{KakomcpError, Result};
use crate::session::JoinedMatch;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub x: i32,
    pub y: i32,
    /// Result code of the agent's action in the last logged turn
    pub last_res: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub agents: Vec<AgentView>,
    pub point: PlayerPoint,
    pub is_me: bool,
}

/// Snapshot returned by the game tools
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub width: usize,
    pub height: usize,
    pub points: Vec<Vec<i32>>,
    pub tiles: Vec<Vec<Tile>>,
    pub n_agent: u32,
    pub now_turn: u32,
    pub total_turn: u32,
    /// Seconds per turn, transition plus operation
    pub turn_sec: u32,
    pub players: Vec<PlayerView>,
}

impl GameSnapshot {
    /// Build the snapshot of `game` as seen by the player in `joined`
    pub fn build(game: &Match, joined: &JoinedMatch) -> Result<Self> {
        let field = game.field.as_ref().ok_or_else(|| KakomcpError::InvalidMatchState {
            description: format!("match {} has no field", game.id),
        })?;

        let points = to_grid(&field.points, field.width, field.height)?;
        let tiles = to_grid(&field.tiles, field.width, field.height)?;

        let last_turn = game.log.last();
        let players = game
            .players
            .iter()
            .enumerate()
            .map(|(i, player)| {
                let actions = last_turn.and_then(|turn| turn.players.get(i));
                let agents = player
                    .agents
                    .iter()
                    .enumerate()
                    .map(|(agent_index, agent)| AgentView {
                        x: agent.x,
                        y: agent.y,
                        last_res: actions.and_then(|log| {
                            log.actions
                                .iter()
                                .find(|a| a.agent_id == agent_index)
                                .and_then(|a| a.res)
                        }),
                    })
                    .collect();

                PlayerView {
                    agents,
                    point: player.point,
                    is_me: i == joined.player_index,
                }
            })
            .collect();

        let turn_sec = game
            .transition_sec
            .checked_add(game.operation_sec)
            .ok_or_else(|| KakomcpError::InvalidMatchState {
                description: format!(
                    "turn length {}s + {}s is out of range",
                    game.transition_sec, game.operation_sec
                ),
            })?;

        Ok(Self {
            width: field.width,
            height: field.height,
            points,
            tiles,
            n_agent: game.n_agent,
            now_turn: game.turn,
            total_turn: game.total_turn,
            turn_sec,
            players,
        })
    }
}

/// Reshape a row-major array so that `grid[y][x] == flat[y * width + x]`
pub fn to_grid<T: Clone>(flat: &[T], width: usize, height: usize) -> Result<Vec<Vec<T>>> {
    let mismatch = || KakomcpError::InvalidMatchState {
        description: format!("board of {}x{} has {} cells", width, height, flat.len()),
    };
    // A zero-width board only makes sense without rows
    if width == 0 {
        return if height == 0 { Ok(Vec::new()) } else { Err(mismatch()) };
    }
    if width.checked_mul(height) != Some(flat.len()) {
        return Err(mismatch());
    }
    Ok(flat.chunks(width).map(|row| row.to_vec()).collect())
}

/// Inverse of [`to_grid`]
pub fn flatten<T: Clone>(grid: &[Vec<T>]) -> Vec<T> {
    grid.iter().flat_map(|row| row.iter().cloned()).collect()
}
