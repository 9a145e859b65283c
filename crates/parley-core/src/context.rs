//! Conversation context — bounded recent-history state for one conversation.
//!
//! The context is the unit of persistence for the two-tier store: cached in
//! the fast tier with a TTL and mirrored to durable storage. The runtime
//! pipeline is its sole writer.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AgentId, ConversationId, UserId};
use crate::message::{Channel, Turn};

/// Default bound on retained turns.
pub const DEFAULT_TURN_LIMIT: usize = 20;

/// Bounded recent-history state of a conversation.
///
/// INVARIANTS:
/// - `turns` never exceeds `turn_limit`; the oldest turn is evicted first.
/// - `last_activity_at` is monotonically non-decreasing.
/// - `current_agent`, once set, names an agent known to the registry
///   (enforced by the router at selection time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    /// Conversation identifier (channel-scoped).
    pub conversation_id: ConversationId,
    /// Owning user.
    pub user_id: UserId,
    /// Channel the conversation lives on.
    pub channel: Channel,
    /// Recent turns, oldest first, bounded to `turn_limit`.
    pub turns: VecDeque<Turn>,
    /// Agent currently holding the conversation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_agent: Option<AgentId>,
    /// Arbitrary conversation metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last activity time (monotonically non-decreasing).
    pub last_activity_at: DateTime<Utc>,
    /// Maximum retained turns.
    #[serde(default = "default_turn_limit")]
    pub turn_limit: usize,
}

fn default_turn_limit() -> usize {
    DEFAULT_TURN_LIMIT
}

impl ConversationContext {
    /// Create a fresh, empty context for an unseen conversation id.
    #[must_use]
    pub fn new(conversation_id: ConversationId, user_id: UserId, channel: Channel) -> Self {
        let now = Utc::now();
        Self {
            conversation_id,
            user_id,
            channel,
            turns: VecDeque::new(),
            current_agent: None,
            metadata: serde_json::Map::new(),
            created_at: now,
            last_activity_at: now,
            turn_limit: DEFAULT_TURN_LIMIT,
        }
    }

    /// Create a fresh context with a non-default turn bound.
    #[must_use]
    pub fn with_turn_limit(mut self, limit: usize) -> Self {
        self.turn_limit = limit.max(1);
        self
    }

    /// Append a turn, evicting the oldest if the bound is reached,
    /// and advance `last_activity_at`.
    pub fn push_turn(&mut self, turn: Turn) {
        while self.turns.len() >= self.turn_limit {
            let _ = self.turns.pop_front();
        }
        self.turns.push_back(turn);
        self.touch();
    }

    /// Advance `last_activity_at` to now. Never moves it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }

    /// Record the agent now holding the conversation.
    pub fn set_current_agent(&mut self, agent_id: AgentId) {
        self.current_agent = Some(agent_id);
    }

    /// True if no turn has ever been recorded.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.turns.is_empty() && self.current_agent.is_none()
    }

    /// Recent turns as a slice-friendly iterator, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }
}
