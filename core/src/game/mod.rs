//! Remote match integration
//!
//! - `types`: wire types of the match API
//! - `api`: the [`GameApi`] contract
//! - `client`: [`HttpGameApi`], the reqwest implementation
//! - `snapshot`: [`GameSnapshot`], the client-facing view
//! - `sync`: [`TurnSyncEngine`], join and turn synchronization

pub mod api;
pub mod client;
pub mod snapshot;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::GameApi;
pub use client::HttpGameApi;
pub use snapshot::GameSnapshot;
pub use sync::{RetryPolicy, StatusCallback, TransientClassifier, TurnSyncEngine};
pub use types::{
    ActionType, AgentAction, AiMatchRequest, JoinRequest, JoinResponse, Match, MatchStatus,
    SubmitResponse,
};
