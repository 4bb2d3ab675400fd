//! Scripted test doubles for the match API and the session store

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::api::GameApi;
use super::types::{
    AgentAction, AgentPosition, Field, JoinRequest, JoinResponse, Match, MatchPlayer,
    MatchStatus, PlayerPoint, SubmitResponse, Tile,
};
use crate::error::{KakomcpError, Result};
use crate::session::{KvStore, MemoryKvStore};

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Step<T> {
    Ok(T),
    Transient,
    Fail(u16, String),
}

impl<T: Clone> Step<T> {
    fn to_result(&self) -> Result<T> {
        match self {
            Step::Ok(value) => Ok(value.clone()),
            Step::Transient => Err(KakomcpError::TransientTransition {
                message: "Can not be set during the transition step".to_string(),
            }),
            Step::Fail(status, message) => Err(KakomcpError::Remote {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

/// Queue that keeps answering with its last step once drained
struct Script<T> {
    steps: VecDeque<Step<T>>,
}

impl<T: Clone> Script<T> {
    fn next(&mut self) -> Result<T> {
        let step = if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().cloned()
        };
        match step {
            Some(step) => step.to_result(),
            None => Err(KakomcpError::Remote {
                status: 500,
                message: "nothing scripted".to_string(),
            }),
        }
    }
}

/// Recorded API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Join(JoinRequest),
    GetMatch(String),
    Submit { game_id: String, pic: String, actions: Vec<AgentAction> },
}

/// [`GameApi`] answering from per-operation scripts
pub struct ScriptedGameApi {
    join: Mutex<Script<JoinResponse>>,
    matches: Mutex<Script<Match>>,
    submits: Mutex<Script<SubmitResponse>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGameApi {
    pub fn new() -> Self {
        Self {
            join: Mutex::new(Script { steps: VecDeque::new() }),
            matches: Mutex::new(Script { steps: VecDeque::new() }),
            submits: Mutex::new(Script { steps: VecDeque::new() }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_join(self, response: JoinResponse) -> Self {
        self.join.lock().steps.push_back(Step::Ok(response));
        self
    }

    pub fn with_matches(self, steps: impl IntoIterator<Item = Step<Match>>) -> Self {
        self.matches.lock().steps.extend(steps);
        self
    }

    pub fn with_submits(self, steps: impl IntoIterator<Item = Step<SubmitResponse>>) -> Self {
        self.submits.lock().steps.extend(steps);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn get_match_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::GetMatch(_)))
            .count()
    }

    pub fn submit_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Submit { .. }))
            .count()
    }
}

#[async_trait]
impl GameApi for ScriptedGameApi {
    async fn join(&self, request: &JoinRequest) -> Result<JoinResponse> {
        self.calls.lock().push(Call::Join(request.clone()));
        self.join.lock().next()
    }

    async fn get_match(&self, game_id: &str) -> Result<Match> {
        self.calls.lock().push(Call::GetMatch(game_id.to_string()));
        self.matches.lock().next()
    }

    async fn submit_actions(
        &self,
        game_id: &str,
        pic: &str,
        actions: &[AgentAction],
    ) -> Result<SubmitResponse> {
        self.calls.lock().push(Call::Submit {
            game_id: game_id.to_string(),
            pic: pic.to_string(),
            actions: actions.to_vec(),
        });
        self.submits.lock().next()
    }
}

/// Memory store that counts writes and deletes
#[derive(Default)]
pub struct CountingKvStore {
    inner: MemoryKvStore,
    sets: AtomicUsize,
    deletes: AtomicUsize,
}

impl CountingKvStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for CountingKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }
    async fn purge_expired(&self) -> Result<usize> {
        self.inner.purge_expired().await
    }
}

/// Two-player 3x2 match in `status` at `turn`
pub fn sample_match(status: MatchStatus, turn: u32) -> Match {
    Match {
        id: "game-1".to_string(),
        status,
        turn,
        total_turn: 10,
        n_agent: 1,
        transition_sec: 1,
        operation_sec: 15,
        field: Some(Field {
            width: 3,
            height: 2,
            points: vec![0, 1, 2, 3, 4, 5],
            tiles: vec![Tile { player: None, kind: None }; 6],
        }),
        players: vec![
            MatchPlayer {
                agents: vec![AgentPosition { x: -1, y: -1 }],
                point: PlayerPoint::default(),
            },
            MatchPlayer {
                agents: vec![AgentPosition { x: -1, y: -1 }],
                point: PlayerPoint::default(),
            },
        ],
        log: Vec::new(),
    }
}

pub fn sample_join() -> JoinResponse {
    JoinResponse {
        game_id: "game-1".to_string(),
        pic: "pic-1".to_string(),
        index: 1,
    }
}
