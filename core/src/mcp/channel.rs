//! Streamable HTTP channel for one MCP session
//!
//! A channel answers POST with JSON-RPC responses, GET with an event stream
//! of server notifications, and DELETE by closing itself. It knows nothing
//! about persistence: closing runs the [`CloseHook`] installed by the router.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::protocol::{codes, notification, IncomingMessage, JsonRpcError, JsonRpcResponse};
use super::server::McpServer;
use super::tools::ToolContext;
use crate::game::StatusCallback;

/// Buffered notifications per channel
const EVENT_BUFFER: usize = 64;

pub const LOGGER_NAME: &str = "kakomcp";

/// HTTP method of an inbound request, as far as the transport cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Delete,
    Other,
}

/// Reply body produced by a channel
#[derive(Debug)]
pub enum ReplyBody {
    Json(Value),
    Empty,
    /// Server notifications, to be relayed as server-sent events
    EventStream(broadcast::Receiver<Value>),
}

/// Transport-level reply; the HTTP front end renders it
#[derive(Debug)]
pub struct ChannelReply {
    pub status: u16,
    /// Sent back in the `mcp-session-id` header when set
    pub session_id: Option<String>,
    pub body: ReplyBody,
}

impl ChannelReply {
    pub fn json(status: u16, session_id: Option<String>, body: Value) -> Self {
        Self {
            status,
            session_id,
            body: ReplyBody::Json(body),
        }
    }

    pub fn empty(status: u16, session_id: Option<String>) -> Self {
        Self {
            status,
            session_id,
            body: ReplyBody::Empty,
        }
    }

    pub fn error(status: u16, session_id: Option<String>, error: JsonRpcError) -> Self {
        Self::json(status, session_id, JsonRpcResponse::failure(Value::Null, error).to_value())
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ReplyBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Outcome of [`SessionChannel::handle`]
#[derive(Debug)]
pub struct Handled {
    pub reply: ChannelReply,
    /// Set when this request initialized the channel and allocated its id
    pub initialized: Option<String>,
}

impl From<ChannelReply> for Handled {
    fn from(reply: ChannelReply) -> Self {
        Self {
            reply,
            initialized: None,
        }
    }
}

/// Runs once when a channel closes
#[async_trait]
pub trait CloseHook: Send + Sync {
    async fn on_close(&self, session_id: &str, channel: &SessionChannel);
}

pub struct SessionChannel {
    server: Arc<McpServer>,
    session_id: OnceLock<String>,
    events: broadcast::Sender<Value>,
    closed: AtomicBool,
    /// Cancelled on close; in-flight tool calls watch it
    cancel: CancellationToken,
    close_hook: Mutex<Option<Arc<dyn CloseHook>>>,
}

impl SessionChannel {
    /// Uninitialized channel; its id is allocated by `initialize`
    pub fn fresh(server: Arc<McpServer>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            server,
            session_id: OnceLock::new(),
            events,
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            close_hook: Mutex::new(None),
        }
    }

    /// Channel for a session initialized before, possibly by another process
    pub fn rehydrated(server: Arc<McpServer>, session_id: impl Into<String>) -> Self {
        let channel = Self::fresh(server);
        let _ = channel.session_id.set(session_id.into());
        channel
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.get().map(String::as_str)
    }

    pub fn is_initialized(&self) -> bool {
        self.session_id.get().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn set_close_hook(&self, hook: Arc<dyn CloseHook>) {
        *self.close_hook.lock() = Some(hook);
    }

    /// Status sink that forwards progress text as `notifications/message`
    pub fn notifier(&self) -> StatusCallback {
        let events = self.events.clone();
        Arc::new(move |message: &str| {
            let event = notification(
                "notifications/message",
                json!({ "level": "info", "logger": LOGGER_NAME, "data": message }),
            );
            // No open event stream is not an error
            let _ = events.send(event);
        })
    }

    /// Close the channel, abandon its in-flight tool calls and run the close
    /// hook; later calls do nothing
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        let hook = self.close_hook.lock().take();
        if let (Some(hook), Some(session_id)) = (hook, self.session_id()) {
            hook.on_close(session_id, self).await;
        }
    }

    pub async fn handle(&self, method: RequestMethod, body: &[u8]) -> Handled {
        let session_id = self.session_id().map(str::to_string);
        if self.is_closed() {
            return ChannelReply::error(404, session_id, JsonRpcError::session("Session closed")).into();
        }

        match method {
            RequestMethod::Post => self.handle_post(body).await,
            RequestMethod::Get => {
                if !self.is_initialized() {
                    return not_initialized().into();
                }
                ChannelReply {
                    status: 200,
                    session_id,
                    body: ReplyBody::EventStream(self.events.subscribe()),
                }
                .into()
            }
            RequestMethod::Delete => {
                self.close().await;
                ChannelReply::empty(200, session_id).into()
            }
            RequestMethod::Other => ChannelReply::error(
                405,
                session_id,
                JsonRpcError::session("Method not allowed."),
            )
            .into(),
        }
    }

    /// Serve a request on a channel that is already bound to its session
    pub async fn reply(&self, method: RequestMethod, body: &[u8]) -> ChannelReply {
        self.handle(method, body).await.reply
    }

    async fn handle_post(&self, body: &[u8]) -> Handled {
        let session_id = self.session_id().map(str::to_string);
        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => return ChannelReply::error(400, session_id, JsonRpcError::parse_error(e)).into(),
        };

        match payload {
            Value::Array(items) => self.handle_batch(items).await.into(),
            single => self.handle_single(single).await,
        }
    }

    async fn handle_single(&self, payload: Value) -> Handled {
        let message = match IncomingMessage::parse(payload) {
            Ok(message) => message,
            Err((id, error)) => {
                let body = JsonRpcResponse::failure(id, error).to_value();
                return ChannelReply::json(400, self.session_id().map(str::to_string), body).into();
            }
        };

        if message.is_initialize() {
            return self.initialize(message).await;
        }
        if !self.is_initialized() {
            return not_initialized().into();
        }

        let session_id = self.session_id().map(str::to_string);
        match self.server.dispatch(message, &self.tool_context()).await {
            Some(response) => ChannelReply::json(200, session_id, response.to_value()).into(),
            None => ChannelReply::empty(202, session_id).into(),
        }
    }

    async fn initialize(&self, message: IncomingMessage) -> Handled {
        if self.is_initialized() {
            return ChannelReply::error(
                400,
                self.session_id().map(str::to_string),
                JsonRpcError::invalid_request("Invalid Request: Server already initialized"),
            )
            .into();
        }

        let Some(response) = self.server.dispatch(message, &ToolContext::default()).await else {
            return ChannelReply::error(500, None, JsonRpcError::internal("initialize produced no response")).into();
        };
        if response.error.is_some() {
            return ChannelReply::json(200, None, response.to_value()).into();
        }

        let session_id = self.session_id.get_or_init(|| Uuid::new_v4().to_string()).clone();
        debug!(session_id = %session_id, "channel initialized");
        Handled {
            reply: ChannelReply::json(200, Some(session_id.clone()), response.to_value()),
            initialized: Some(session_id),
        }
    }

    async fn handle_batch(&self, items: Vec<Value>) -> ChannelReply {
        let session_id = self.session_id().map(str::to_string);
        if items.is_empty() {
            return ChannelReply::error(400, session_id, JsonRpcError::invalid_request("Invalid Request: empty batch"));
        }
        if items.iter().any(|item| item.get("method").and_then(Value::as_str) == Some("initialize")) {
            return ChannelReply::error(
                400,
                session_id,
                JsonRpcError::invalid_request("Invalid Request: initialize must not be batched"),
            );
        }
        if !self.is_initialized() {
            return not_initialized();
        }

        let ctx = self.tool_context();
        let mut responses = Vec::new();
        for item in items {
            match IncomingMessage::parse(item) {
                Ok(message) => {
                    if let Some(response) = self.server.dispatch(message, &ctx).await {
                        responses.push(response.to_value());
                    }
                }
                Err((id, error)) => responses.push(JsonRpcResponse::failure(id, error).to_value()),
            }
        }

        if responses.is_empty() {
            ChannelReply::empty(202, session_id)
        } else {
            ChannelReply::json(200, session_id, Value::Array(responses))
        }
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext {
            session_id: self.session_id().map(str::to_string),
            status: Some(self.notifier()),
            cancel: self.cancel.clone(),
        }
    }
}

fn not_initialized() -> ChannelReply {
    ChannelReply::error(
        400,
        None,
        JsonRpcError::new(codes::SESSION_ERROR, "Bad Request: Server not initialized"),
    )
}
