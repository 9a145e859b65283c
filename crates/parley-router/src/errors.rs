//! Router errors.

use parley_core::agent::AgentCategory;
use parley_core::errors::ModelError;
use parley_core::ids::AgentId;

/// Errors raised by registry construction and routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Registry has no active fallback agent; routing could dead-end.
    #[error("registry must contain an active fallback agent")]
    NoFallback,

    /// Two active descriptors claim the same category.
    #[error("duplicate active descriptor for category {0}")]
    DuplicateCategory(AgentCategory),

    /// Registry was handed an empty descriptor set.
    #[error("registry requires at least one descriptor")]
    Empty,

    /// The selected agent's answer call failed after exhausting retries.
    #[error("agent {agent} failed to answer after {attempts} attempts: {source}")]
    InvocationFailed {
        /// The agent that failed.
        agent: AgentId,
        /// Total attempts issued.
        attempts: u32,
        /// Final failure.
        #[source]
        source: ModelError,
    },
}
