pub mod config;
pub mod error;
pub mod factory;
pub mod game;
pub mod mcp;
pub mod session;


// Re-exports for convenience
pub use config::Config;
pub use error::{KakomcpError, Result};
pub use factory::{create_router, create_router_with};
pub use mcp::{ChannelReply, InboundRequest, ReplyBody, RequestMethod, TransportRouter, SESSION_HEADER};
