//! Agent selection and the retried answer call.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::counter;
use parley_core::context::ConversationContext;
use parley_core::errors::ModelError;
use parley_core::ids::AgentId;
use parley_core::message::{NormalizedMessage, Turn};
use parley_settings::RouterSettings;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::errors::RouterError;
use crate::registry::{AgentRegistry, RegisteredAgent};

/// How the winning agent was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionPath {
    /// Current agent stayed confident; fan-out skipped.
    KeptCurrent,
    /// Fan-out ran and the best scorer won.
    FanOut,
    /// Fan-out winner was too weak; fallback took over.
    FallbackOverride,
}

/// Result of a routing decision.
pub struct RoutingDecision {
    /// The winning agent.
    pub agent: Arc<RegisteredAgent>,
    /// The confidence that won (the fallback's own score when overridden).
    pub confidence: f64,
    /// How the winner was chosen.
    pub path: SelectionPath,
    /// Previous agent when this decision hands the conversation over.
    pub switched_from: Option<AgentId>,
}

impl RoutingDecision {
    /// Name of the winning agent.
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent.descriptor.name
    }
}

/// Routing decision engine over an injected registry.
pub struct Router {
    registry: Arc<AgentRegistry>,
    settings: RouterSettings,
}

impl Router {
    /// Create a router.
    #[must_use]
    pub fn new(registry: Arc<AgentRegistry>, settings: RouterSettings) -> Self {
        Self { registry, settings }
    }

    /// The registry this router selects from.
    #[must_use]
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Select the agent that answers this turn.
    ///
    /// A confident current agent short-circuits the fan-out entirely; this
    /// is the common path for mid-conversation turns. Confidence queries
    /// that fail or time out score 0 and never abort routing.
    #[instrument(skip(self, message, context), fields(conversation_id = %context.conversation_id))]
    pub async fn select_agent(
        &self,
        message: &NormalizedMessage,
        context: &ConversationContext,
    ) -> RoutingDecision {
        let history: Vec<Turn> = context.turns.iter().cloned().collect();

        // Sticky current agent: query only it, keep it if confident.
        if let Some(current_id) = &context.current_agent {
            match self.registry.resolve(current_id) {
                Some(agent) if agent.descriptor.active => {
                    let score = self.score(agent, &message.content, &history).await;
                    if score >= self.settings.keep_current_threshold {
                        debug!(agent = %current_id, score, "current agent keeps the turn");
                        return RoutingDecision {
                            agent: Arc::clone(agent),
                            confidence: score,
                            path: SelectionPath::KeptCurrent,
                            switched_from: None,
                        };
                    }
                    debug!(agent = %current_id, score, "current agent lost confidence, fanning out");
                }
                _ => {
                    // Registry reload can orphan a stored agent id.
                    warn!(agent = %current_id, "current agent not resolvable, fanning out");
                }
            }
        }

        // Fan-out: every active agent scores the same message/history pair
        // concurrently. This is the only point issuing multiple model
        // calls per turn.
        let candidates: Vec<&Arc<RegisteredAgent>> = self.registry.active().collect();
        let scores = join_all(
            candidates
                .iter()
                .copied()
                .map(|agent| self.score(agent, &message.content, &history)),
        )
        .await;

        let mut best: Option<(&Arc<RegisteredAgent>, f64)> = None;
        for (agent, score) in candidates.iter().copied().zip(scores) {
            let beats = match best {
                None => true,
                Some((best_agent, best_score)) => {
                    score > best_score
                        || (score == best_score
                            && agent.descriptor.category.priority()
                                > best_agent.descriptor.category.priority())
                }
            };
            if beats {
                best = Some((agent, score));
            }
        }

        // Registry guarantees at least the fallback agent is active.
        let (winner, winning_score) =
            best.map_or_else(|| (self.registry.fallback(), 0.0), |(a, s)| (a, s));

        let (agent, confidence, path) = if winning_score < self.settings.fallback_threshold {
            let fallback = self.registry.fallback();
            debug!(
                winner = %winner.descriptor.name,
                winning_score,
                "winning confidence below threshold, overriding with fallback"
            );
            (Arc::clone(fallback), winning_score, SelectionPath::FallbackOverride)
        } else {
            (Arc::clone(winner), winning_score, SelectionPath::FanOut)
        };

        let switched_from = context
            .current_agent
            .as_ref()
            .filter(|prev| *prev != &agent.descriptor.name)
            .cloned();
        if let Some(prev) = &switched_from {
            counter!("router_agent_transitions_total").increment(1);
            info!(from = %prev, to = %agent.descriptor.name, "agent transition");
        }

        RoutingDecision {
            agent,
            confidence,
            path,
            switched_from,
        }
    }

    /// Invoke the selected agent's answer call — exactly one logical
    /// invocation per turn, retried only for transient failures.
    #[instrument(skip(self, decision, message, context), fields(agent = %decision.agent_id()))]
    pub async fn respond(
        &self,
        decision: &RoutingDecision,
        message: &NormalizedMessage,
        context: &ConversationContext,
    ) -> Result<String, RouterError> {
        let descriptor = &decision.agent.descriptor;
        let provider = &decision.agent.provider;
        let history: Vec<Turn> = context.turns.iter().cloned().collect();
        let invoke_timeout = Duration::from_millis(self.settings.invoke_timeout_ms);
        let retry = &self.settings.retry;

        let mut attempt = 1;
        loop {
            let call = provider.invoke(
                &descriptor.invocation.prompt_template,
                &history,
                &message.content,
                &descriptor.invocation,
            );
            let result = match timeout(invoke_timeout, call).await {
                Ok(inner) => inner,
                Err(_) => Err(ModelError::Timeout {
                    timeout_ms: self.settings.invoke_timeout_ms,
                }),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.retryable() && attempt < retry.max_attempts => {
                    let delay = retry.delay_for_attempt(attempt);
                    counter!("router_invoke_retries_total").increment(1);
                    warn!(
                        agent = %descriptor.name,
                        attempt,
                        ?delay,
                        error = %e,
                        "answer call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    counter!("router_invoke_failures_total").increment(1);
                    return Err(RouterError::InvocationFailed {
                        agent: descriptor.name.clone(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// One confidence query under its own timeout. Failures score 0.
    async fn score(&self, agent: &Arc<RegisteredAgent>, content: &str, history: &[Turn]) -> f64 {
        let limit = Duration::from_millis(self.settings.confidence_timeout_ms);
        match timeout(limit, agent.provider.confidence(content, history)).await {
            Ok(Ok(score)) => score.clamp(0.0, 1.0),
            Ok(Err(e)) => {
                debug!(agent = %agent.descriptor.name, error = %e, "confidence call failed, scoring 0");
                0.0
            }
            Err(_) => {
                debug!(agent = %agent.descriptor.name, "confidence call timed out, scoring 0");
                0.0
            }
        }
    }
}
