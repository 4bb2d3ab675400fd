//! Model Context Protocol over streamable HTTP
//!
//! - `protocol`: JSON-RPC message types and protocol constants
//! - `tools`: the tool catalogue
//! - `server`: [`McpServer`], method dispatch
//! - `channel`: [`SessionChannel`], one live session transport
//! - `router`: [`TransportRouter`], session-aware request routing

pub mod channel;
pub mod protocol;
pub mod router;
pub mod server;
pub mod tools;

pub use channel::{ChannelReply, CloseHook, ReplyBody, RequestMethod, SessionChannel};
pub use protocol::SESSION_HEADER;
pub use router::{ChannelTable, InboundRequest, Route, TransportRouter};
pub use server::McpServer;
pub use tools::{McpTool, ToolContext, ToolRegistry};
