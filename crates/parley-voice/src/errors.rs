//! Voice session errors.

use parley_core::ids::ConnectionId;
use parley_guard::AdmissionError;
use parley_runtime::PipelineError;

use crate::session::SessionState;
use crate::speech::SpeechError;

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VoiceError>;

/// Errors raised by voice session management.
///
/// Turn-level failures ([`VoiceError::TurnBudget`],
/// [`VoiceError::Speech`], [`VoiceError::Pipeline`]) leave the session
/// active; only lifecycle errors concern the connection itself.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The guard refused the connection.
    #[error("admission denied: {0}")]
    Admission(#[from] AdmissionError),

    /// No registered session under this connection id.
    #[error("unknown session {0}")]
    UnknownSession(ConnectionId),

    /// Frames are only accepted while the session is active.
    #[error("session is {state:?}; frames are only accepted while active")]
    NotActive {
        /// State the session was found in.
        state: SessionState,
    },

    /// The state machine refused a lifecycle transition.
    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// The whole turn (transcribe + route + invoke + persist) overran
    /// its latency budget.
    #[error("turn exceeded its {budget_ms}ms budget")]
    TurnBudget {
        /// Configured budget.
        budget_ms: u64,
    },

    /// The speech collaborator failed.
    #[error("speech provider failed: {0}")]
    Speech(#[from] SpeechError),

    /// The turn pipeline failed downstream of transcription.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
