//! Call-record repository — append-only, stateless over `&Connection`.

use parley_core::ids::{CallId, ConversationId};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::durable::CallRecord;
use crate::errors::{Result, StoreError};

/// Completed-call record repository.
pub struct CallRepo;

impl CallRepo {
    /// Append one record. Rows are never updated or deleted.
    pub fn append(conn: &Connection, record: &CallRecord) -> Result<()> {
        let id = format!("rec_{}", Uuid::now_v7());
        let _ = conn.execute(
            "INSERT INTO call_records
                 (id, call_id, conversation_id, duration_ms, transcript_ref, audio_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                record.call_id.as_str(),
                record.conversation_id.as_str(),
                i64::try_from(record.duration_ms).unwrap_or(i64::MAX),
                record.transcript_ref,
                record.audio_ref,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All records for a conversation, oldest first.
    pub fn list_for_conversation(
        conn: &Connection,
        conversation_id: &ConversationId,
    ) -> Result<Vec<CallRecord>> {
        let mut stmt = conn.prepare(
            "SELECT call_id, conversation_id, duration_ms, transcript_ref, audio_ref, created_at
             FROM call_records
             WHERE conversation_id = ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id.as_str()], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<CallRecord> {
        let created_at: String = row.get(5)?;
        Ok(CallRecord {
            call_id: CallId::from(row.get::<_, String>(0)?),
            conversation_id: ConversationId::from(row.get::<_, String>(1)?),
            duration_ms: row.get::<_, i64>(2)?.max(0) as u64,
            transcript_ref: row.get(3)?,
            audio_ref: row.get(4)?,
            // A malformed created_at maps to the epoch rather than failing
            // the whole listing.
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_default(),
        })
    }

    /// Number of records stored for a conversation.
    pub fn count_for_conversation(
        conn: &Connection,
        conversation_id: &ConversationId,
    ) -> Result<u64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM call_records WHERE conversation_id = ?1",
            params![conversation_id.as_str()],
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|e| StoreError::Durable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::connection::new_in_memory;
    use chrono::Utc;

    fn record(call: &str, conv: &str, duration_ms: u64) -> CallRecord {
        CallRecord {
            call_id: CallId::from(call),
            conversation_id: ConversationId::from(conv),
            duration_ms,
            transcript_ref: Some(format!("transcripts/{call}")),
            audio_ref: Some(format!("audio/{call}")),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn append_then_list_in_order() {
        let pool = new_in_memory().unwrap();
        let conn = pool.get().unwrap();

        let mut first = record("call-1", "conv-1", 10_000);
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        CallRepo::append(&conn, &first).unwrap();
        CallRepo::append(&conn, &record("call-2", "conv-1", 20_000)).unwrap();

        let records = CallRepo::list_for_conversation(&conn, &ConversationId::from("conv-1")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].call_id.as_str(), "call-1");
        assert_eq!(records[1].call_id.as_str(), "call-2");
    }

    #[test]
    fn conversations_are_isolated() {
        let pool = new_in_memory().unwrap();
        let conn = pool.get().unwrap();
        CallRepo::append(&conn, &record("call-1", "conv-1", 1)).unwrap();
        CallRepo::append(&conn, &record("call-2", "conv-2", 2)).unwrap();

        let records = CallRepo::list_for_conversation(&conn, &ConversationId::from("conv-2")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].call_id.as_str(), "call-2");
        assert_eq!(
            CallRepo::count_for_conversation(&conn, &ConversationId::from("conv-1")).unwrap(),
            1
        );
    }

    #[test]
    fn optional_refs_roundtrip_as_null() {
        let pool = new_in_memory().unwrap();
        let conn = pool.get().unwrap();
        let mut r = record("call-1", "conv-1", 5);
        r.transcript_ref = None;
        r.audio_ref = None;
        CallRepo::append(&conn, &r).unwrap();

        let records = CallRepo::list_for_conversation(&conn, &ConversationId::from("conv-1")).unwrap();
        assert!(records[0].transcript_ref.is_none());
        assert!(records[0].audio_ref.is_none());
    }
}
