//! Configuration management
//!
//! All configuration types are exported from this module.

pub mod store;

pub use store::{
    AiMatchConfig, ApiConfig, Config, RetryConfig, ServerConfig, StoreBackend, StoreConfig,
};
