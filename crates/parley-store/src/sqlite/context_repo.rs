//! Context repository — stateless, every method takes `&Connection`.
//!
//! Contexts are stored as one JSON payload per conversation id. The
//! payload is the serde form of
//! [`ConversationContext`](parley_core::context::ConversationContext);
//! `user_id`/`channel` are denormalized into columns for operational
//! queries.

use parley_core::context::ConversationContext;
use parley_core::ids::ConversationId;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;

/// Context repository.
pub struct ContextRepo;

impl ContextRepo {
    /// Upsert a context keyed by its conversation id.
    pub fn put(conn: &Connection, context: &ConversationContext) -> Result<()> {
        let payload = serde_json::to_string(context)?;
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO contexts (conversation_id, user_id, channel, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 user_id = excluded.user_id,
                 channel = excluded.channel,
                 payload = excluded.payload,
                 updated_at = excluded.updated_at",
            params![
                context.conversation_id.as_str(),
                context.user_id.as_str(),
                context.channel.to_string(),
                payload,
                now,
            ],
        )?;
        Ok(())
    }

    /// Fetch a context by conversation id.
    pub fn get(
        conn: &Connection,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationContext>> {
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM contexts WHERE conversation_id = ?1",
                params![conversation_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Delete a context. Returns true if a row was removed.
    pub fn delete(conn: &Connection, conversation_id: &ConversationId) -> Result<bool> {
        let affected = conn.execute(
            "DELETE FROM contexts WHERE conversation_id = ?1",
            params![conversation_id.as_str()],
        )?;
        Ok(affected > 0)
    }
}
