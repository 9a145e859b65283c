//! [`SqliteStore`] — the pooled, retrying [`DurableStore`] implementation.

use std::path::Path;
use std::time::Duration;

use parley_core::context::ConversationContext;
use parley_core::ids::ConversationId;
use tracing::{debug, warn};

use crate::durable::{CallRecord, DurableStore};
use crate::errors::{Result, StoreError};
use crate::sqlite::call_repo::CallRepo;
use crate::sqlite::connection::{ConnectionPool, new_in_memory, open_pool};
use crate::sqlite::context_repo::ContextRepo;

/// Durable store over a pooled SQLite database.
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    const BUSY_MAX_RETRIES: u32 = 32;

    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open_pool(path)?))
    }

    /// In-memory store for tests and ephemeral deployments.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(new_in_memory()?))
    }

    /// Retry an operation on SQLite BUSY/LOCKED with linear backoff + jitter.
    ///
    /// Backoff: base = min(attempts * 10, 500) ms, jitter ±25% to prevent
    /// thundering herd when multiple writers contend on the same database.
    fn retry_on_busy<T>(&self, mut f: impl FnMut(&ConnectionPool) -> Result<T>) -> Result<T> {
        let mut attempts = 0;
        loop {
            match f(&self.pool) {
                Ok(value) => return Ok(value),
                Err(StoreError::Sqlite(e)) if is_busy(&e) && attempts < Self::BUSY_MAX_RETRIES => {
                    attempts += 1;
                    let base = (attempts * 10).min(500) as f64;
                    let jitter = base * 0.25 * (rand::random::<f64>() * 2.0 - 1.0);
                    let delay = Duration::from_millis((base + jitter).max(1.0) as u64);
                    debug!(attempts, ?delay, "sqlite busy, retrying");
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

impl DurableStore for SqliteStore {
    fn get_context(&self, conversation_id: &ConversationId) -> Result<Option<ConversationContext>> {
        self.retry_on_busy(|pool| {
            let conn = pool.get()?;
            ContextRepo::get(&conn, conversation_id)
        })
    }

    fn put_context(&self, context: &ConversationContext) -> Result<()> {
        self.retry_on_busy(|pool| {
            let conn = pool.get()?;
            ContextRepo::put(&conn, context)
        })
    }

    fn delete_context(&self, conversation_id: &ConversationId) -> Result<()> {
        self.retry_on_busy(|pool| {
            let conn = pool.get()?;
            if !ContextRepo::delete(&conn, conversation_id)? {
                warn!(conversation_id = %conversation_id, "close of unknown conversation");
            }
            Ok(())
        })
    }

    fn append_call_record(&self, record: &CallRecord) -> Result<()> {
        self.retry_on_busy(|pool| {
            let conn = pool.get()?;
            CallRepo::append(&conn, record)
        })
    }

    fn list_call_records(&self, conversation_id: &ConversationId) -> Result<Vec<CallRecord>> {
        self.retry_on_busy(|pool| {
            let conn = pool.get()?;
            CallRepo::list_for_conversation(&conn, conversation_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::ids::{CallId, UserId};
    use parley_core::message::{Channel, Turn};

    fn ctx(id: &str) -> ConversationContext {
        ConversationContext::new(
            ConversationId::from(id),
            UserId::from("user-1"),
            Channel::Voice,
        )
    }

    #[test]
    fn contexts_roundtrip_through_trait() {
        let store = SqliteStore::in_memory().unwrap();
        let mut c = ctx("conv-1");
        c.push_turn(Turn::inbound("hello"));
        store.put_context(&c).unwrap();

        let loaded = store.get_context(&c.conversation_id).unwrap().unwrap();
        assert_eq!(loaded, c);

        store.delete_context(&c.conversation_id).unwrap();
        assert!(store.get_context(&c.conversation_id).unwrap().is_none());
    }

    #[test]
    fn deleting_unknown_context_is_not_an_error() {
        let store = SqliteStore::in_memory().unwrap();
        store.delete_context(&ConversationId::from("ghost")).unwrap();
    }

    #[test]
    fn call_records_append_through_trait() {
        let store = SqliteStore::in_memory().unwrap();
        let record = CallRecord {
            call_id: CallId::from("call-1"),
            conversation_id: ConversationId::from("conv-1"),
            duration_ms: 42_000,
            transcript_ref: None,
            audio_ref: Some("audio/key".into()),
            created_at: Utc::now(),
        };
        store.append_call_record(&record).unwrap();
        let listed = store
            .list_call_records(&ConversationId::from("conv-1"))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].audio_ref.as_deref(), Some("audio/key"));
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put_context(&ctx("conv-1")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(
            store
                .get_context(&ConversationId::from("conv-1"))
                .unwrap()
                .is_some()
        );
    }
}
