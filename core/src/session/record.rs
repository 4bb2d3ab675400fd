//! Persisted per-session state

use serde::{Deserialize, Serialize};

/// The match a session has joined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedMatch {
    /// Player credential used to submit actions
    pub pic: String,
    pub game_id: String,
    pub player_index: usize,
    /// Last turn confirmed by the remote match
    pub now_turn: u32,
}

/// Record stored under `sessions/<id>`; `data` is empty until a match is joined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JoinedMatch>,
}

impl SessionRecord {
    /// Record for a freshly initialized session
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn joined(joined: JoinedMatch) -> Self {
        Self { data: Some(joined) }
    }

    pub fn has_match(&self) -> bool {
        self.data.is_some()
    }
}
