//! Structured error types for kakomcp
//!
//! One enum covers session, match, remote API and store failures so that
//! tool handlers can turn any of them into a tool-execution failure, while
//! the retry loops can still single out the transient cases.

use thiserror::Error;

/// Primary error type for kakomcp operations
#[derive(Error, Debug)]
pub enum KakomcpError {
    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Inbound request carries no usable session (rendered as a protocol error)
    #[error("Bad Request: No valid session ID provided")]
    ProtocolSession,

    /// Tool invoked on a channel that has no session id yet
    #[error("session id is not available for this request")]
    SessionIdUnavailable,

    /// No persisted record exists for the session
    #[error("session not found: {session_id}")]
    SessionMissing { session_id: String },

    /// Session exists but no match has been joined or created yet
    #[error("no game has been started for this session; call create-ai-game or join-game first")]
    GameNotJoined { session_id: String },

    /// The session's channel closed while a call was still waiting on the match
    #[error("session {session_id} was closed")]
    SessionClosed { session_id: String },

    // =========================================================================
    // Match Errors
    // =========================================================================
    /// The remote match is between turns and does not accept the operation yet
    #[error("match is in a transition step: {message}")]
    TransientTransition { message: String },

    /// The match ended while waiting for the turn to advance
    #[error("game {game_id} has ended")]
    MatchEnded { game_id: String },

    /// The remote reported a match we cannot build a snapshot from
    #[error("invalid match state: {description}")]
    InvalidMatchState { description: String },

    /// An operator-configured attempt bound ran out
    #[error("{operation} gave up after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },

    // =========================================================================
    // Remote API / Transport Errors
    // =========================================================================
    /// The match API answered with an error status
    #[error("match API error: {status} - {message}")]
    Remote { status: u16, message: String },

    /// Request never produced an API answer (connect, timeout, decode)
    #[error("HTTP error: {0}")]
    Http(String),

    // =========================================================================
    // Tool Errors
    // =========================================================================
    /// Tool not found
    #[error("tool not found: {tool_name}")]
    ToolNotFound { tool_name: String },

    /// Invalid tool arguments
    #[error("invalid tool arguments for {tool_name}: {reason}")]
    InvalidToolArguments { tool_name: String, reason: String },

    // =========================================================================
    // Store / Configuration Errors
    // =========================================================================
    /// Persisted store failure
    #[error("session store error: {message}")]
    Store { message: String },

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),
}

impl KakomcpError {
    /// Whether the error means "match is mid-transition, try again"
    pub fn is_transient_transition(&self) -> bool {
        matches!(self, Self::TransientTransition { .. })
    }

    /// Errors raised before any network call because the session is not ready
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::SessionIdUnavailable | Self::SessionMissing { .. } | Self::GameNotJoined { .. }
        )
    }
}

impl From<serde_json::Error> for KakomcpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for KakomcpError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Result type alias using KakomcpError
pub type Result<T> = std::result::Result<T, KakomcpError>;
