//! Speech collaborator seam.
//!
//! Speech-to-text and text-to-speech live outside this crate; the
//! session manager only depends on this trait.

use async_trait::async_trait;
use bytes::Bytes;

/// Failure of a speech collaborator call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpeechError {
    /// Speech-to-text failed.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Text-to-speech failed.
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

/// Speech-to-text and text-to-speech for one voice transport.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Transcribe one drained turn of audio.
    async fn transcribe(&self, audio: Bytes) -> Result<String, SpeechError>;

    /// Synthesize reply audio from the agent's answer text.
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError>;
}
