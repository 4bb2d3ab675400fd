//! Remote match API contract

use async_trait::async_trait;

use super::types::{AgentAction, JoinRequest, JoinResponse, Match, SubmitResponse};
use crate::error::Result;

/// The match service as seen by the turn engine.
///
/// Implementations report a match that is between turns as
/// [`KakomcpError::TransientTransition`](crate::error::KakomcpError::TransientTransition);
/// every other failure is returned as-is.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Join or create a match
    async fn join(&self, request: &JoinRequest) -> Result<JoinResponse>;

    /// Current state of a match
    async fn get_match(&self, game_id: &str) -> Result<Match>;

    /// Submit this player's actions for the current turn
    async fn submit_actions(
        &self,
        game_id: &str,
        pic: &str,
        actions: &[AgentAction],
    ) -> Result<SubmitResponse>;
}
