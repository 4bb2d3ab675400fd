//! Session persistence
//!
//! - `record`: the persisted [`SessionRecord`]
//! - `kv`: key-value backends implementing [`KvStore`]
//! - `registry`: [`SessionRegistry`], the typed record lifecycle on top

pub mod kv;
pub mod record;
pub mod registry;

pub use kv::{spawn_expiry_sweep, FileKvStore, KvStore, MemoryKvStore};
pub use record::{JoinedMatch, SessionRecord};
pub use registry::SessionRegistry;
