//! Message and turn types shared across channels.
//!
//! Channel adapters (telephony webhook, SMS webhook, chat transport)
//! normalize their payloads into [`NormalizedMessage`] before handing them
//! to the runtime pipeline, and receive an [`AgentReply`] in the same shape
//! for outbound delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AgentId, ConversationId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Channel / direction
// ─────────────────────────────────────────────────────────────────────────────

/// Delivery channel a conversation lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Real-time voice call (streamed audio).
    Voice,
    /// SMS text messaging.
    Sms,
    /// Web or in-app chat.
    Chat,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Voice => "voice",
            Self::Sms => "sms",
            Self::Chat => "chat",
        };
        f.write_str(s)
    }
}

/// Direction of a turn relative to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the user to the backend.
    Inbound,
    /// From the backend to the user.
    Outbound,
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn
// ─────────────────────────────────────────────────────────────────────────────

/// One half of an exchange: a single inbound or outbound utterance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Direction of this turn.
    pub direction: Direction,
    /// Text content.
    pub content: String,
    /// Agent that produced (outbound) or will handle (inbound) this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// When the turn occurred.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Build an inbound turn stamped now.
    #[must_use]
    pub fn inbound(content: impl Into<String>) -> Self {
        Self {
            direction: Direction::Inbound,
            content: content.into(),
            agent_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Build an outbound turn from the given agent, stamped now.
    #[must_use]
    pub fn outbound(content: impl Into<String>, agent_id: AgentId) -> Self {
        Self {
            direction: Direction::Outbound,
            content: content.into(),
            agent_id: Some(agent_id),
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalized message / reply
// ─────────────────────────────────────────────────────────────────────────────

/// Channel-agnostic inbound message, as delivered by a channel adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Sending user.
    pub user_id: UserId,
    /// Originating channel.
    pub channel: Channel,
    /// Text content (for voice, the transcript of one turn).
    pub content: String,
    /// When the channel received the message.
    pub timestamp: DateTime<Utc>,
    /// Adapter-specific extras (source IP, webhook ids, media URLs).
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl NormalizedMessage {
    /// Build a message stamped now with empty metadata.
    #[must_use]
    pub fn new(
        conversation_id: impl Into<ConversationId>,
        user_id: impl Into<UserId>,
        channel: Channel,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            channel,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Source IP recorded by the adapter, if any (`sourceIp` metadata key).
    #[must_use]
    pub fn source_ip(&self) -> Option<&str> {
        self.metadata.get("sourceIp").and_then(Value::as_str)
    }
}

/// Outbound reply returned to the channel adapter for delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReply {
    /// Conversation the reply belongs to.
    pub conversation_id: ConversationId,
    /// Recipient user.
    pub user_id: UserId,
    /// Channel to deliver on.
    pub channel: Channel,
    /// Reply text.
    pub content: String,
    /// Agent that produced the reply.
    pub agent_id: AgentId,
    /// When the reply was produced.
    pub timestamp: DateTime<Utc>,
}
