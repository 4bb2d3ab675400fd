//! Wiring of the session store, match client, engine and tools

use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::game::{GameApi, HttpGameApi, RetryPolicy, TurnSyncEngine};
use crate::mcp::tools::{
    ActionAndNextTurnTool, CreateAiGameTool, GetAiListTool, JoinGameTool, ToolRegistry,
};
use crate::mcp::{McpServer, TransportRouter};
use crate::session::{spawn_expiry_sweep, FileKvStore, KvStore, MemoryKvStore, SessionRegistry};

const INSTRUCTIONS: &str = "Play Kakomimasu. Start with create-ai-game or join-game, \
then call action-and-nextturn once per turn until the match ends.";

/// Open the configured session store backend and start its expiry sweep
pub async fn create_store(config: &Config) -> Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryKvStore::new()),
        StoreBackend::File => {
            let dir = config.store.data_dir()?;
            info!(dir = %dir.display(), "using file session store");
            Arc::new(FileKvStore::open(dir).await?)
        }
    };
    if let Some(every) = config.store.sweep_interval() {
        spawn_expiry_sweep(&store, every);
    }
    Ok(store)
}

/// Register the game tools against `engine`
pub fn create_tools(config: &Config, engine: Arc<TurnSyncEngine>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(GetAiListTool));
    tools.register(Arc::new(CreateAiGameTool::new(engine.clone(), config.ai_match.clone())));
    tools.register(Arc::new(JoinGameTool::new(engine.clone())));
    tools.register(Arc::new(ActionAndNextTurnTool::new(engine)));
    tools
}

/// Build a router over explicit collaborators
pub fn create_router_with(
    config: &Config,
    store: Arc<dyn KvStore>,
    api: Arc<dyn GameApi>,
) -> TransportRouter {
    let registry = SessionRegistry::new(store, config.store.ttl());
    let policy = RetryPolicy::from_config(&config.retry);
    let engine = Arc::new(TurnSyncEngine::new(api, registry.clone(), policy));
    let server = McpServer::new(create_tools(config, engine)).with_instructions(INSTRUCTIONS);
    TransportRouter::new(registry, Arc::new(server))
}

/// Build the router described by `config`
pub async fn create_router(config: &Config) -> Result<TransportRouter> {
    let store = create_store(config).await?;
    let api: Arc<dyn GameApi> = Arc::new(HttpGameApi::new(&config.api)?);
    Ok(create_router_with(config, store, api))
}
