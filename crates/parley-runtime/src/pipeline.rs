//! The ordered stages of one conversational turn.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use parley_core::ids::ConversationId;
use parley_core::message::{AgentReply, NormalizedMessage, Turn};
use parley_guard::RateLimiter;
use parley_router::{Router, SelectionPath};
use parley_store::{ContextSource, ContextStore};
use tracing::{info, instrument, warn};

use crate::errors::Result;

/// What one successful turn produced, beyond the reply itself.
#[derive(Debug)]
pub struct TurnOutcome {
    /// The outbound reply for the channel adapter to deliver.
    pub reply: AgentReply,
    /// Winning confidence for the turn.
    pub confidence: f64,
    /// How the agent was chosen.
    pub path: SelectionPath,
    /// Tier that served the context.
    pub context_source: ContextSource,
    /// False when the save left a durability warning behind.
    pub durable: bool,
}

/// The turn pipeline: admit, load, route, answer, persist.
///
/// Stateless across turns; all state lives in the injected components,
/// so one `Pipeline` serves every channel adapter concurrently.
pub struct Pipeline {
    guard: Arc<RateLimiter>,
    store: Arc<ContextStore>,
    router: Arc<Router>,
}

impl Pipeline {
    /// Assemble a pipeline over shared components.
    #[must_use]
    pub fn new(guard: Arc<RateLimiter>, store: Arc<ContextStore>, router: Arc<Router>) -> Self {
        Self {
            guard,
            store,
            router,
        }
    }

    /// The admission guard, shared with session managers.
    #[must_use]
    pub fn guard(&self) -> &Arc<RateLimiter> {
        &self.guard
    }

    /// The context store, shared with session managers.
    #[must_use]
    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    /// Process one inbound message end to end.
    ///
    /// Stage order matters: admission runs before any storage or model
    /// work so denied traffic costs nothing, and the inbound turn is
    /// appended only after the answer call succeeds so a failed turn
    /// leaves the context untouched.
    #[instrument(
        skip(self, message),
        fields(conversation_id = %message.conversation_id, channel = ?message.channel)
    )]
    pub async fn handle_message(&self, message: NormalizedMessage) -> Result<TurnOutcome> {
        self.guard
            .admit_message(message.user_id.as_str(), message.source_ip())?;

        let loaded = self
            .store
            .load(&message.conversation_id, &message.user_id, message.channel);
        if loaded.degraded {
            warn!("both storage tiers down, answering from a fresh context");
        }
        let mut context = loaded.context;

        let decision = self.router.select_agent(&message, &context).await;
        let text = match self.router.respond(&decision, &message, &context).await {
            Ok(text) => text,
            Err(e) => {
                if let Some(ip) = message.source_ip() {
                    self.guard.record_failure(ip);
                }
                counter!("pipeline_turn_failures_total").increment(1);
                return Err(e.into());
            }
        };

        context.push_turn(Turn::inbound(message.content.clone()));
        context.push_turn(Turn::outbound(text.clone(), decision.agent_id().clone()));
        context.set_current_agent(decision.agent_id().clone());

        let saved = self.store.save(&context)?;
        counter!("pipeline_turns_total").increment(1);
        info!(
            agent = %decision.agent_id(),
            path = ?decision.path,
            durable = saved.fully_durable(),
            "turn completed"
        );

        Ok(TurnOutcome {
            reply: AgentReply {
                conversation_id: message.conversation_id,
                user_id: message.user_id,
                channel: message.channel,
                content: text,
                agent_id: decision.agent_id().clone(),
                timestamp: Utc::now(),
            },
            confidence: decision.confidence,
            path: decision.path,
            context_source: loaded.source,
            durable: saved.fully_durable(),
        })
    }

    /// Forget a finished conversation's durable context.
    pub fn close_conversation(&self, conversation_id: &ConversationId) -> Result<()> {
        self.store.close(conversation_id)?;
        Ok(())
    }

    /// Count a failure attributable to `source_ip` toward its block
    /// threshold.
    pub fn record_failure(&self, source_ip: &str) {
        self.guard.record_failure(source_ip);
    }
}
