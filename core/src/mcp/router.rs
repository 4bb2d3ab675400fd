//! Session-aware routing of inbound MCP requests
//!
//! Every `/mcp` request is resolved to a live [`SessionChannel`]:
//!
//! | session id | binding | record | initialize | route       |
//! |------------|---------|--------|------------|-------------|
//! | yes        | yes     |        |            | reuse       |
//! | yes        | no      | yes    |            | rehydrate   |
//! | yes        | no      | no     |            | reject      |
//! | no         |         |        | yes        | mint        |
//! | no         |         |        | no         | reject      |
//!
//! Bindings live only in this process; records live in the
//! [`SessionRegistry`] and outlast restarts until their TTL lapses.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{info, warn};

use super::channel::{ChannelReply, CloseHook, RequestMethod, SessionChannel};
use super::protocol::{is_initialize_request, session_rejection, JsonRpcError};
use super::server::McpServer;
use crate::error::Result;
use crate::session::{SessionRecord, SessionRegistry};

/// In-process bindings from session id to live channel
#[derive(Default)]
pub struct ChannelTable {
    slots: RwLock<HashMap<String, Arc<SessionChannel>>>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionChannel>> {
        self.slots.read().get(session_id).cloned()
    }

    /// Bind `session_id`, replacing any earlier binding
    pub fn insert(&self, session_id: impl Into<String>, channel: Arc<SessionChannel>) {
        self.slots.write().insert(session_id.into(), channel);
    }

    /// Return the bound channel, binding `make()` first if the slot is empty
    pub fn get_or_insert_with(
        &self,
        session_id: &str,
        make: impl FnOnce() -> Arc<SessionChannel>,
    ) -> (Arc<SessionChannel>, bool) {
        if let Some(existing) = self.get(session_id) {
            return (existing, false);
        }
        let mut slots = self.slots.write();
        if let Some(existing) = slots.get(session_id) {
            return (existing.clone(), false);
        }
        let channel = make();
        slots.insert(session_id.to_string(), channel.clone());
        (channel, true)
    }

    /// Unbind `session_id` only while it is still bound to `channel`
    pub fn remove(&self, session_id: &str, channel: &SessionChannel) -> bool {
        let mut slots = self.slots.write();
        match slots.get(session_id) {
            Some(bound) if std::ptr::eq(Arc::as_ptr(bound), channel) => {
                slots.remove(session_id);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

/// What the front end knows about one inbound request
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub session_id: Option<String>,
    pub method: RequestMethod,
    pub body: Vec<u8>,
}

/// Routing decision for an inbound request
pub enum Route {
    Reuse(Arc<SessionChannel>),
    Rehydrate(String),
    Mint,
    Reject,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Reuse(channel) => f
                .debug_tuple("Reuse")
                .field(&channel.session_id())
                .finish(),
            Route::Rehydrate(id) => f.debug_tuple("Rehydrate").field(id).finish(),
            Route::Mint => f.write_str("Mint"),
            Route::Reject => f.write_str("Reject"),
        }
    }
}

/// Close hook shared by minted and rehydrated channels
struct SessionTeardown {
    table: Weak<ChannelTable>,
    registry: SessionRegistry,
}

#[async_trait]
impl CloseHook for SessionTeardown {
    async fn on_close(&self, session_id: &str, channel: &SessionChannel) {
        if let Some(table) = self.table.upgrade() {
            table.remove(session_id, channel);
        }
        match self.registry.delete(session_id).await {
            Ok(()) => info!(session_id, "session closed"),
            Err(e) => warn!(session_id, error = %e, "failed to delete session record"),
        }
    }
}

pub struct TransportRouter {
    table: Arc<ChannelTable>,
    registry: SessionRegistry,
    server: Arc<McpServer>,
}

impl TransportRouter {
    pub fn new(registry: SessionRegistry, server: Arc<McpServer>) -> Self {
        Self {
            table: Arc::new(ChannelTable::new()),
            registry,
            server,
        }
    }

    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Decide how to serve `request`
    pub async fn route(&self, request: &InboundRequest) -> Result<Route> {
        if let Some(session_id) = request.session_id.as_deref() {
            if let Some(channel) = self.table.get(session_id) {
                return Ok(Route::Reuse(channel));
            }
            return Ok(match self.registry.get(session_id).await? {
                Some(_) => Route::Rehydrate(session_id.to_string()),
                None => Route::Reject,
            });
        }

        let is_initialize = request.method == RequestMethod::Post
            && serde_json::from_slice::<serde_json::Value>(&request.body)
                .map(|body| is_initialize_request(&body))
                .unwrap_or(false);
        Ok(if is_initialize { Route::Mint } else { Route::Reject })
    }

    /// Route and serve one request; never fails past this point
    pub async fn handle(&self, request: InboundRequest) -> ChannelReply {
        let route = match self.route(&request).await {
            Ok(route) => route,
            Err(e) => {
                warn!(session_id = ?request.session_id, error = %e, "session lookup failed");
                return ChannelReply::error(500, None, JsonRpcError::internal(e.to_string()));
            }
        };

        match route {
            Route::Reuse(channel) => channel.reply(request.method, &request.body).await,
            Route::Rehydrate(session_id) => self.rehydrate(&session_id).reply(request.method, &request.body).await,
            Route::Mint => self.mint(request).await,
            Route::Reject => {
                warn!(session_id = ?request.session_id, method = ?request.method, "rejected request without a valid session");
                ChannelReply::json(400, None, session_rejection())
            }
        }
    }

    /// Bind a new channel to a known session id, or join one bound concurrently
    fn rehydrate(&self, session_id: &str) -> Arc<SessionChannel> {
        let (channel, created) = self.table.get_or_insert_with(session_id, || {
            let channel = Arc::new(SessionChannel::rehydrated(self.server.clone(), session_id));
            channel.set_close_hook(self.teardown());
            channel
        });
        if created {
            info!(session_id, "session rehydrated");
        }
        channel
    }

    async fn mint(&self, request: InboundRequest) -> ChannelReply {
        let channel = Arc::new(SessionChannel::fresh(self.server.clone()));
        let handled = channel.handle(request.method, &request.body).await;
        let Some(session_id) = handled.initialized else {
            return handled.reply;
        };

        match self.register(&session_id, channel).await {
            Ok(()) => {
                info!(session_id = %session_id, "session minted");
                handled.reply
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to persist new session");
                ChannelReply::error(500, None, JsonRpcError::internal(e.to_string()))
            }
        }
    }

    /// Persist the empty record, then bind the channel
    async fn register(&self, session_id: &str, channel: Arc<SessionChannel>) -> Result<()> {
        self.registry.set(session_id, &SessionRecord::empty()).await?;
        channel.set_close_hook(self.teardown());
        self.table.insert(session_id, channel);
        Ok(())
    }

    fn teardown(&self) -> Arc<dyn CloseHook> {
        Arc::new(SessionTeardown {
            table: Arc::downgrade(&self.table),
            registry: self.registry.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tools::{GetAiListTool, ToolRegistry};
    use crate::session::MemoryKvStore;
    use serde_json::json;
    use std::time::Duration;

    fn router_with(registry: SessionRegistry) -> TransportRouter {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(GetAiListTool));
        TransportRouter::new(registry, Arc::new(McpServer::new(tools)))
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(3600))
    }

    fn post(session_id: Option<&str>, body: serde_json::Value) -> InboundRequest {
        InboundRequest {
            session_id: session_id.map(str::to_string),
            method: RequestMethod::Post,
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    fn initialize() -> serde_json::Value {
        json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {"protocolVersion": "2025-06-18"}})
    }

    #[tokio::test]
    async fn test_route_decisions() {
        let registry = registry();
        registry.set("stored", &SessionRecord::empty()).await.unwrap();
        let router = router_with(registry);

        assert!(matches!(router.route(&post(None, initialize())).await.unwrap(), Route::Mint));
        assert!(matches!(
            router.route(&post(None, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))).await.unwrap(),
            Route::Reject
        ));
        assert!(matches!(
            router.route(&post(Some("stored"), json!({}))).await.unwrap(),
            Route::Rehydrate(ref id) if id == "stored"
        ));
        assert!(matches!(router.route(&post(Some("unknown"), initialize())).await.unwrap(), Route::Reject));

        let _ = router.rehydrate("stored");
        assert!(matches!(router.route(&post(Some("stored"), json!({}))).await.unwrap(), Route::Reuse(_)));
    }

    #[tokio::test]
    async fn test_mint_persists_then_binds() {
        let router = router_with(registry());
        let reply = router.handle(post(None, initialize())).await;

        let session_id = reply.session_id.clone().unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(router.registry().get(&session_id).await.unwrap(), Some(SessionRecord::empty()));
        assert!(router.table().get(&session_id).is_some());
    }

    #[tokio::test]
    async fn test_concurrent_rehydration_converges() {
        let registry = registry();
        registry.set("s", &SessionRecord::empty()).await.unwrap();
        let router = Arc::new(router_with(registry));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let router = router.clone();
                tokio::spawn(async move {
                    router
                        .handle(post(Some("s"), json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})))
                        .await
                })
            })
            .collect();
        for handle in handles {
            let reply = handle.await.unwrap();
            assert_eq!(reply.status, 200);
            assert_eq!(reply.session_id.as_deref(), Some("s"));
        }
        assert_eq!(router.table().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_close_does_not_unbind_replacement() {
        let table = ChannelTable::new();
        let server = Arc::new(McpServer::new(ToolRegistry::new()));
        let old = Arc::new(SessionChannel::rehydrated(server.clone(), "s"));
        let new = Arc::new(SessionChannel::rehydrated(server, "s"));

        table.insert("s", old.clone());
        table.insert("s", new.clone());
        assert!(!table.remove("s", &old));
        assert!(table.get("s").is_some());
        assert!(table.remove("s", &new));
        assert!(table.is_empty());
    }
}
