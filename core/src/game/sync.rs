//! TurnSyncEngine - keeps a session's record in step with the remote match
//!
//! Two entry points:
//!
//! - [`TurnSyncEngine::match_join`]: join or create a match, wait until it
//!   is `gaming`, persist the joined match.
//! - [`TurnSyncEngine::action_submit`]: submit actions, wait until the
//!   remote turn counter moves past the stored one, then persist.
//!
//! The stored turn is written only after the remote has confirmed the
//! advance, so a failure anywhere in between leaves the record untouched.
//!
//! Polls run until success, a permanent error, or the session's channel
//! closing. Delays, the transient classifier and an optional attempt bound
//! come from [`RetryPolicy`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::api::GameApi;
use super::snapshot::GameSnapshot;
use super::types::{AgentAction, JoinRequest, Match, MatchStatus};
use crate::config::RetryConfig;
use crate::error::{KakomcpError, Result};
use crate::session::{JoinedMatch, SessionRecord, SessionRegistry};

/// Decides whether an error is the "match is mid-transition" kind
pub type TransientClassifier = Arc<dyn Fn(&KakomcpError) -> bool + Send + Sync>;

/// Receives human-readable progress while the engine waits
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Poll and retry behaviour of the engine
#[derive(Clone)]
pub struct RetryPolicy {
    /// Delay between "get match" polls
    pub poll_interval: Duration,
    /// Delay before re-submitting actions refused mid-transition
    pub submit_retry_delay: Duration,
    /// Attempt bound per loop; `None` retries forever
    pub max_attempts: Option<u32>,
    pub is_transient: TransientClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            submit_retry_delay: Duration::from_millis(500),
            max_attempts: None,
            is_transient: Arc::new(KakomcpError::is_transient_transition),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("poll_interval", &self.poll_interval)
            .field("submit_retry_delay", &self.submit_retry_delay)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            submit_retry_delay: Duration::from_millis(config.submit_retry_ms),
            max_attempts: config.max_attempts,
            ..Self::default()
        }
    }

    pub fn with_classifier(mut self, classifier: TransientClassifier) -> Self {
        self.is_transient = classifier;
        self
    }

    /// Fails once `attempts` has reached the configured bound
    fn check_attempts(&self, operation: &str, attempts: u32) -> Result<()> {
        match self.max_attempts {
            Some(max) if attempts >= max => Err(KakomcpError::RetriesExhausted {
                operation: operation.to_string(),
                attempts,
            }),
            _ => Ok(()),
        }
    }
}

fn report(status: Option<&StatusCallback>, message: &str) {
    if let Some(callback) = status {
        callback(message);
    }
}

/// One engine call on behalf of a session, abandoned once its channel closes
struct CallScope<'a> {
    session_id: &'a str,
    cancel: &'a CancellationToken,
}

impl CallScope<'_> {
    fn closed(&self) -> KakomcpError {
        KakomcpError::SessionClosed {
            session_id: self.session_id.to_string(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(self.closed());
        }
        Ok(())
    }

    /// Run `operation` unless the channel closes first
    async fn run<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(session_id = self.session_id, "channel closed, abandoning call");
                Err(self.closed())
            }
            outcome = operation => outcome,
        }
    }

    async fn pause(&self, delay: Duration) -> Result<()> {
        self.run(async {
            sleep(delay).await;
            Ok(())
        })
        .await
    }
}

/// Drives join and turn submission against the remote match
pub struct TurnSyncEngine {
    api: Arc<dyn GameApi>,
    registry: SessionRegistry,
    policy: RetryPolicy,
}

impl TurnSyncEngine {
    pub fn new(api: Arc<dyn GameApi>, registry: SessionRegistry, policy: RetryPolicy) -> Self {
        Self {
            api,
            registry,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Join or create a match and wait for it to start.
    ///
    /// Persists `{pic, gameId, playerIndex, nowTurn}` once the match reports
    /// `gaming` and returns the first snapshot. Cancelling `cancel` abandons
    /// the call without writing anything.
    pub async fn match_join(
        &self,
        session_id: &str,
        request: &JoinRequest,
        status: Option<&StatusCallback>,
        cancel: &CancellationToken,
    ) -> Result<GameSnapshot> {
        let scope = CallScope { session_id, cancel };
        let joined = scope.run(self.api.join(request)).await?;
        info!(
            session_id,
            game_id = %joined.game_id,
            player_index = joined.index,
            "joined match, waiting for start"
        );
        report(status, &format!("Joined game {}, waiting for it to start", joined.game_id));

        let game = self.wait_for_start(&scope, &joined.game_id).await?;

        let joined = JoinedMatch {
            pic: joined.pic,
            game_id: joined.game_id,
            player_index: joined.index,
            now_turn: game.turn,
        };
        let snapshot = GameSnapshot::build(&game, &joined)?;
        self.persist(&scope, &SessionRecord::joined(joined)).await?;
        info!(session_id, game_id = %game.id, turn = game.turn, "match started");
        Ok(snapshot)
    }

    /// Poll until the match is `gaming`: check, then sleep, then check again
    async fn wait_for_start(&self, scope: &CallScope<'_>, game_id: &str) -> Result<Match> {
        let mut attempts = 0u32;
        loop {
            let game = scope.run(self.api.get_match(game_id)).await?;
            attempts += 1;
            if game.status == MatchStatus::Gaming {
                return Ok(game);
            }
            debug!(game_id, status = ?game.status, attempts, "match not started yet");
            self.policy.check_attempts("waiting for match start", attempts)?;
            scope.pause(self.policy.poll_interval).await?;
        }
    }

    /// Submit actions and wait for the turn to advance.
    ///
    /// Fails before any remote call when the session is unknown or has not
    /// joined a match. The stored turn changes exactly once, after the
    /// remote confirms the advance, and never once `cancel` has fired.
    pub async fn action_submit(
        &self,
        session_id: &str,
        actions: &[AgentAction],
        status: Option<&StatusCallback>,
        cancel: &CancellationToken,
    ) -> Result<GameSnapshot> {
        let scope = CallScope { session_id, cancel };
        let mut record = self
            .registry
            .get(session_id)
            .await?
            .ok_or_else(|| KakomcpError::SessionMissing {
                session_id: session_id.to_string(),
            })?;
        let joined = record
            .data
            .as_mut()
            .ok_or_else(|| KakomcpError::GameNotJoined {
                session_id: session_id.to_string(),
            })?;

        let submitted_turn = self.submit_until_accepted(&scope, joined, actions).await?;
        report(status, &format!("Actions accepted for turn {}, waiting for next turn", submitted_turn));

        let baseline = joined.now_turn.max(submitted_turn);
        let game = self.wait_for_turn_advance(&scope, &joined.game_id, baseline).await?;

        joined.now_turn = game.turn;
        let snapshot = GameSnapshot::build(&game, joined)?;
        self.persist(&scope, &record).await?;
        info!(session_id, turn = game.turn, "turn advanced");
        Ok(snapshot)
    }

    async fn submit_until_accepted(
        &self,
        scope: &CallScope<'_>,
        joined: &JoinedMatch,
        actions: &[AgentAction],
    ) -> Result<u32> {
        let mut attempts = 0u32;
        loop {
            match scope
                .run(self.api.submit_actions(&joined.game_id, &joined.pic, actions))
                .await
            {
                Ok(response) => return Ok(response.turn),
                Err(e) if (self.policy.is_transient)(&e) => {
                    attempts += 1;
                    debug!(game_id = %joined.game_id, attempts, "match in transition, retrying submit");
                    self.policy.check_attempts("submitting actions", attempts)?;
                }
                Err(e) => return Err(e),
            }
            scope.pause(self.policy.submit_retry_delay).await?;
        }
    }

    /// Poll until `turn > baseline`; an `ended` match before that is fatal
    async fn wait_for_turn_advance(
        &self,
        scope: &CallScope<'_>,
        game_id: &str,
        baseline: u32,
    ) -> Result<Match> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match scope.run(self.api.get_match(game_id)).await {
                Ok(game) if game.turn > baseline => return Ok(game),
                Ok(game) if game.status == MatchStatus::Ended => {
                    info!(game_id, turn = game.turn, "match ended before turn advanced");
                    return Err(KakomcpError::MatchEnded {
                        game_id: game_id.to_string(),
                    });
                }
                Ok(game) => debug!(game_id, turn = game.turn, baseline, "turn not advanced yet"),
                Err(e) if (self.policy.is_transient)(&e) => {
                    debug!(game_id, "match in transition while polling turn");
                }
                Err(e) => return Err(e),
            }
            self.policy.check_attempts("waiting for next turn", attempts)?;
            scope.pause(self.policy.poll_interval).await?;
        }
    }

    /// Write the record unless the channel has closed. A close that lands
    /// while the write is in flight may already have deleted the record, so
    /// the write is undone in that case.
    async fn persist(&self, scope: &CallScope<'_>, record: &SessionRecord) -> Result<()> {
        scope.ensure_open()?;
        self.registry.set(scope.session_id, record).await?;
        if scope.cancel.is_cancelled() {
            self.registry.delete(scope.session_id).await?;
            return Err(scope.closed());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fake::{sample_join, sample_match, Call, CountingKvStore, ScriptedGameApi, Step};
    use crate::session::{KvStore, MemoryKvStore};
    use async_trait::async_trait;
    use crate::game::types::{ActionType, AiMatchRequest, SubmitResponse};
    use tokio::time::Instant;

    const SESSION: &str = "session-1";

    fn engine(api: Arc<ScriptedGameApi>) -> (Arc<CountingKvStore>, SessionRegistry, TurnSyncEngine) {
        let store = CountingKvStore::new();
        let registry = SessionRegistry::new(store.clone(), Duration::from_secs(3600));
        let engine = TurnSyncEngine::new(api, registry.clone(), RetryPolicy::default());
        (store, registry, engine)
    }

    fn ai_request() -> JoinRequest {
        JoinRequest::Ai(AiMatchRequest {
            guest_name: "tester".to_string(),
            ai_name: "a1".to_string(),
            transition_sec: 1,
            operation_sec: 15,
            board_name: "A-2".to_string(),
            n_agent: 1,
            total_turn: 10,
        })
    }

    fn actions() -> Vec<AgentAction> {
        vec![AgentAction {
            agent_index: 0,
            kind: ActionType::Put,
            x: 1,
            y: 1,
        }]
    }

    fn joined_record(now_turn: u32) -> SessionRecord {
        SessionRecord::joined(JoinedMatch {
            pic: "pic-1".to_string(),
            game_id: "game-1".to_string(),
            player_index: 1,
            now_turn,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_waits_for_gaming_with_two_delays() {
        let api = Arc::new(
            ScriptedGameApi::new().with_join(sample_join()).with_matches([
                Step::Ok(sample_match(MatchStatus::Matching, 0)),
                Step::Ok(sample_match(MatchStatus::Matching, 0)),
                Step::Ok(sample_match(MatchStatus::Gaming, 1)),
            ]),
        );
        let (_, registry, engine) = engine(api.clone());

        let started = Instant::now();
        let snapshot = engine.match_join(SESSION, &ai_request(), None, &CancellationToken::new()).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(api.get_match_calls(), 3);
        assert_eq!(snapshot.now_turn, 1);
        assert!(snapshot.players[1].is_me);
        assert!(!snapshot.players[0].is_me);

        let record = registry.get(SESSION).await.unwrap().unwrap();
        assert_eq!(record, joined_record(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_propagates_poll_errors_without_persisting() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_join(sample_join())
                .with_matches([Step::Fail(404, "Could not find match".to_string())]),
        );
        let (store, _, engine) = engine(api);

        let err = engine.match_join(SESSION, &ai_request(), None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KakomcpError::Remote { status: 404, .. }));
        assert_eq!(store.sets(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_reports_progress() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_join(sample_join())
                .with_matches([Step::Ok(sample_match(MatchStatus::Gaming, 0))]),
        );
        let (_, _, engine) = engine(api);

        let messages = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let sink = messages.clone();
        let status: StatusCallback = Arc::new(move |m: &str| sink.lock().push(m.to_string()));

        engine.match_join(SESSION, &ai_request(), Some(&status), &CancellationToken::new()).await.unwrap();
        assert_eq!(messages.lock().len(), 1);
        assert!(messages.lock()[0].contains("game-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_without_record_makes_no_remote_call() {
        let api = Arc::new(ScriptedGameApi::new());
        let (_, _, engine) = engine(api.clone());

        let err = engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KakomcpError::SessionMissing { .. }));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_before_join_makes_no_remote_call() {
        let api = Arc::new(ScriptedGameApi::new());
        let (_, registry, engine) = engine(api.clone());
        registry.set(SESSION, &SessionRecord::empty()).await.unwrap();

        let err = engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KakomcpError::GameNotJoined { .. }));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_retries_transient_then_persists_confirmed_turn_once() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_submits([
                    Step::Transient,
                    Step::Transient,
                    Step::Ok(SubmitResponse { turn: 5 }),
                ])
                .with_matches([
                    Step::Ok(sample_match(MatchStatus::Gaming, 5)),
                    Step::Transient,
                    Step::Ok(sample_match(MatchStatus::Gaming, 6)),
                ]),
        );
        let (store, registry, engine) = engine(api.clone());
        registry.set(SESSION, &joined_record(5)).await.unwrap();
        let writes_before = store.sets();

        let started = Instant::now();
        let snapshot = engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()).await.unwrap();

        // two submit retries at 500ms, two poll delays at 1s
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(api.submit_calls(), 3);
        assert_eq!(api.get_match_calls(), 3);
        assert_eq!(snapshot.now_turn, 6);
        assert_eq!(store.sets() - writes_before, 1);
        assert_eq!(registry.get(SESSION).await.unwrap().unwrap(), joined_record(6));

        assert!(api.calls().contains(&Call::Submit {
            game_id: "game-1".to_string(),
            pic: "pic-1".to_string(),
            actions: actions(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_transient_submit_never_confirms_or_writes() {
        let api = Arc::new(ScriptedGameApi::new().with_submits([Step::Transient]));
        let (store, registry, engine) = engine(api.clone());
        registry.set(SESSION, &joined_record(5)).await.unwrap();
        let writes_before = store.sets();

        let outcome = tokio::time::timeout(
            Duration::from_secs(30),
            engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()),
        )
        .await;

        assert!(outcome.is_err());
        assert!(api.submit_calls() > 10);
        assert_eq!(api.get_match_calls(), 0);
        assert_eq!(store.sets(), writes_before);
        assert_eq!(registry.get(SESSION).await.unwrap().unwrap(), joined_record(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_end_while_waiting_fails_without_write() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_submits([Step::Ok(SubmitResponse { turn: 5 })])
                .with_matches([
                    Step::Ok(sample_match(MatchStatus::Gaming, 5)),
                    Step::Ok(sample_match(MatchStatus::Gaming, 5)),
                    Step::Ok(sample_match(MatchStatus::Ended, 5)),
                ]),
        );
        let (store, registry, engine) = engine(api.clone());
        registry.set(SESSION, &joined_record(5)).await.unwrap();
        let writes_before = store.sets();

        let err = engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KakomcpError::MatchEnded { ref game_id } if game_id == "game-1"));
        assert_eq!(api.get_match_calls(), 3);
        assert_eq!(store.sets(), writes_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_submit_error_aborts() {
        let api = Arc::new(
            ScriptedGameApi::new().with_submits([Step::Fail(401, "Unauthorized".to_string())]),
        );
        let (store, registry, engine) = engine(api.clone());
        registry.set(SESSION, &joined_record(2)).await.unwrap();
        let writes_before = store.sets();

        let err = engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KakomcpError::Remote { status: 401, .. }));
        assert_eq!(api.submit_calls(), 1);
        assert_eq!(api.get_match_calls(), 0);
        assert_eq!(store.sets(), writes_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submitted_turn_ahead_of_record_raises_baseline() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_submits([Step::Ok(SubmitResponse { turn: 7 })])
                .with_matches([
                    Step::Ok(sample_match(MatchStatus::Gaming, 7)),
                    Step::Ok(sample_match(MatchStatus::Gaming, 8)),
                ]),
        );
        let (_, registry, engine) = engine(api.clone());
        registry.set(SESSION, &joined_record(5)).await.unwrap();

        let snapshot = engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()).await.unwrap();
        assert_eq!(snapshot.now_turn, 8);
        assert_eq!(api.get_match_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_bound_stops_submit_loop() {
        let api = Arc::new(ScriptedGameApi::new().with_submits([Step::Transient]));
        let store = CountingKvStore::new();
        let registry = SessionRegistry::new(store.clone(), Duration::from_secs(3600));
        let policy = RetryPolicy {
            max_attempts: Some(3),
            ..RetryPolicy::default()
        };
        let engine = TurnSyncEngine::new(api.clone(), registry.clone(), policy);
        registry.set(SESSION, &joined_record(1)).await.unwrap();

        let err = engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KakomcpError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(api.submit_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier_treats_remote_error_as_transient() {
        let api = Arc::new(ScriptedGameApi::new().with_submits([
            Step::Fail(503, "busy".to_string()),
            Step::Ok(SubmitResponse { turn: 1 }),
        ]).with_matches([Step::Ok(sample_match(MatchStatus::Gaming, 2))]));
        let store = CountingKvStore::new();
        let registry = SessionRegistry::new(store, Duration::from_secs(3600));
        let policy = RetryPolicy::default().with_classifier(Arc::new(|e: &KakomcpError| {
            e.is_transient_transition() || matches!(e, KakomcpError::Remote { status: 503, .. })
        }));
        let engine = TurnSyncEngine::new(api.clone(), registry.clone(), policy);
        registry.set(SESSION, &joined_record(1)).await.unwrap();

        let snapshot = engine.action_submit(SESSION, &actions(), None, &CancellationToken::new()).await.unwrap();
        assert_eq!(snapshot.now_turn, 2);
        assert_eq!(api.submit_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_turn_poll_abandons_without_write() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_submits([Step::Ok(SubmitResponse { turn: 5 })])
                .with_matches([Step::Ok(sample_match(MatchStatus::Gaming, 5))]),
        );
        let (store, registry, engine) = engine(api.clone());
        registry.set(SESSION, &joined_record(5)).await.unwrap();
        let writes_before = store.sets();

        let cancel = CancellationToken::new();
        let close = async {
            sleep(Duration::from_millis(2500)).await;
            cancel.cancel();
        };
        let submitted = actions();
        let (outcome, ()) = tokio::join!(engine.action_submit(SESSION, &submitted, None, &cancel), close);

        let err = outcome.unwrap_err();
        assert!(matches!(err, KakomcpError::SessionClosed { ref session_id } if session_id == SESSION));
        assert_eq!(api.get_match_calls(), 3);
        assert_eq!(store.sets(), writes_before);
        assert_eq!(registry.get(SESSION).await.unwrap().unwrap(), joined_record(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_waiting_for_start_abandons_join() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_join(sample_join())
                .with_matches([Step::Ok(sample_match(MatchStatus::Matching, 0))]),
        );
        let (store, registry, engine) = engine(api.clone());

        let cancel = CancellationToken::new();
        let close = async {
            sleep(Duration::from_millis(1500)).await;
            cancel.cancel();
        };
        let request = ai_request();
        let (outcome, ()) = tokio::join!(engine.match_join(SESSION, &request, None, &cancel), close);

        assert!(matches!(outcome.unwrap_err(), KakomcpError::SessionClosed { .. }));
        assert_eq!(api.get_match_calls(), 2);
        assert_eq!(store.sets(), 0);
        assert!(registry.get(SESSION).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_makes_no_remote_call() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_join(sample_join())
                .with_matches([Step::Ok(sample_match(MatchStatus::Gaming, 1))]),
        );
        let (store, _, engine) = engine(api.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine.match_join(SESSION, &ai_request(), None, &cancel).await.unwrap_err();
        assert!(matches!(err, KakomcpError::SessionClosed { .. }));
        assert!(api.calls().is_empty());
        assert_eq!(store.sets(), 0);
    }

    /// Store whose first write lands just as the channel closes
    struct CloseDuringWrite {
        inner: MemoryKvStore,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl KvStore for CloseDuringWrite {
        async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
            self.inner.set(key, value, ttl).await?;
            self.cancel.cancel();
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_racing_the_final_write_leaves_no_record() {
        let api = Arc::new(
            ScriptedGameApi::new()
                .with_join(sample_join())
                .with_matches([Step::Ok(sample_match(MatchStatus::Gaming, 1))]),
        );
        let cancel = CancellationToken::new();
        let store = Arc::new(CloseDuringWrite {
            inner: MemoryKvStore::new(),
            cancel: cancel.clone(),
        });
        let registry = SessionRegistry::new(store, Duration::from_secs(3600));
        let engine = TurnSyncEngine::new(api, registry.clone(), RetryPolicy::default());

        let err = engine.match_join(SESSION, &ai_request(), None, &cancel).await.unwrap_err();
        assert!(matches!(err, KakomcpError::SessionClosed { .. }));
        assert!(registry.get(SESSION).await.unwrap().is_none());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            poll_interval_ms: 250,
            submit_retry_ms: 100,
            max_attempts: Some(9),
        });
        assert_eq!(policy.poll_interval, Duration::from_millis(250));
        assert_eq!(policy.submit_retry_delay, Duration::from_millis(100));
        assert_eq!(policy.max_attempts, Some(9));
        assert!((policy.is_transient)(&KakomcpError::TransientTransition {
            message: String::new()
        }));
    }
}
