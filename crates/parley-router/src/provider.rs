//! Model-invocation capability trait.
//!
//! One implementation per agent category (a greeting provider, an intent
//! classifier, ...) — the router depends only on this interface, never on
//! concrete per-category types. Production implementations wrap the
//! external model service; tests use [`MockModelProvider`].

use async_trait::async_trait;
use parley_core::agent::InvocationConfig;
use parley_core::errors::ModelError;
use parley_core::message::Turn;

/// Capability interface every specialized agent implements.
///
/// Both calls accept a caller-supplied timeout by construction: the router
/// wraps them in `tokio::time::timeout`, so implementations should be
/// cancel-safe.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Score how confident this agent is that it should answer `content`,
    /// given the bounded turn history. Must return a value in [0, 1];
    /// the router clamps out-of-range scores.
    async fn confidence(&self, content: &str, history: &[Turn]) -> Result<f64, ModelError>;

    /// Produce the agent's answer for `content`.
    async fn invoke(
        &self,
        system_prompt: &str,
        history: &[Turn],
        content: &str,
        sampling: &InvocationConfig,
    ) -> Result<String, ModelError>;
}
