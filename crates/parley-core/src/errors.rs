//! Shared error vocabulary for external collaborator calls.
//!
//! Each crate defines its own error enum; the types here are the ones that
//! cross crate seams. [`ModelError`] classifies failures of the
//! model-invocation collaborator so the router's retry policy can
//! distinguish transient/throttling failures from permanent ones.

use serde::{Deserialize, Serialize};

/// Failure of a model-invocation call.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ModelError {
    /// The call exceeded its caller-supplied timeout.
    #[error("model call timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The provider throttled the call (rate limit, overload).
    #[error("model provider throttled the call")]
    Throttled {
        /// Provider-suggested wait before retrying, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },

    /// Network or transport-level failure.
    #[error("model transport error: {0}")]
    Transport(String),

    /// The provider answered but the response was unusable.
    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    /// Authentication or configuration problem. Never retried.
    #[error("model call rejected: {0}")]
    Rejected(String),
}

impl ModelError {
    /// Whether the retry policy may re-issue the call.
    ///
    /// Only transient transport conditions and throttling qualify;
    /// malformed responses and rejections fail fast.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Throttled { .. } | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ModelError::Timeout { timeout_ms: 5000 }.retryable());
        assert!(
            ModelError::Throttled {
                retry_after_ms: Some(2000)
            }
            .retryable()
        );
        assert!(ModelError::Transport("connection reset".into()).retryable());
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!ModelError::InvalidResponse("empty body".into()).retryable());
        assert!(!ModelError::Rejected("bad api key".into()).retryable());
    }

    #[test]
    fn error_serde_tagged() {
        let e = ModelError::Timeout { timeout_ms: 1000 };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "timeout");
        assert_eq!(json["timeoutMs"], 1000);
    }
}
