//! Durable-tier abstraction and completed-call records.

use chrono::{DateTime, Utc};
use parley_core::context::ConversationContext;
use parley_core::ids::{CallId, ConversationId};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Append-only record of a completed voice call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Call identifier.
    pub call_id: CallId,
    /// Conversation the call belonged to.
    pub conversation_id: ConversationId,
    /// Call duration in milliseconds.
    pub duration_ms: u64,
    /// Object-store key of the full transcript, if exported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_ref: Option<String>,
    /// Object-store key of the recorded audio, if exported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// Durable keyed storage for conversation contexts plus append-only
/// call records.
///
/// Implementations must be safe to call from many pipeline instances
/// concurrently; context writes for distinct conversation ids never
/// contend logically.
pub trait DurableStore: Send + Sync {
    /// Fetch the stored context for `conversation_id`, if any.
    fn get_context(&self, conversation_id: &ConversationId) -> Result<Option<ConversationContext>>;

    /// Upsert the context keyed by its conversation id.
    fn put_context(&self, context: &ConversationContext) -> Result<()>;

    /// Delete the context. Only called on explicit conversation close.
    fn delete_context(&self, conversation_id: &ConversationId) -> Result<()>;

    /// Append a completed-call record. Records are never updated.
    fn append_call_record(&self, record: &CallRecord) -> Result<()>;

    /// All call records for a conversation, oldest first.
    fn list_call_records(&self, conversation_id: &ConversationId) -> Result<Vec<CallRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_record_serde_roundtrip() {
        let record = CallRecord {
            call_id: CallId::from("call-1"),
            conversation_id: ConversationId::from("conv-1"),
            duration_ms: 64_000,
            transcript_ref: Some("transcripts/abcd".into()),
            audio_ref: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: CallRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
