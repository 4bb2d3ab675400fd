//! SessionRegistry - lifecycle of persisted session records
//!
//! The registry is the only component that reads or writes session records.
//! Every `set` is an idempotent upsert that restarts the record's TTL, so an
//! active session never expires while a session abandoned without a DELETE
//! disappears after the TTL.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::kv::KvStore;
use super::record::SessionRecord;
use crate::error::Result;

const KEY_PREFIX: &str = "sessions/";

/// Typed access to session records in a [`KvStore`]
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(session_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, session_id)
    }

    /// Record for `session_id`, or `None` when unknown or expired
    pub async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        match self.store.get(&Self::key(session_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Upsert the record and restart its TTL
    pub async fn set(&self, session_id: &str, record: &SessionRecord) -> Result<()> {
        debug!(session_id, joined = record.has_match(), "persisting session record");
        let value = serde_json::to_value(record)?;
        self.store.set(&Self::key(session_id), value, self.ttl).await
    }

    /// Remove the record; unknown ids are a no-op
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        debug!(session_id, "deleting session record");
        self.store.delete(&Self::key(session_id)).await
    }
}
