//! One live voice connection and its lifecycle state machine.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use parley_core::ids::{CallId, ConnectionId, ConversationId, UserId};
use parley_guard::ConnectionPermit;

use crate::buffer::AudioBuffer;
use crate::errors::VoiceError;

/// Lifecycle of a voice connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Admission pending; no frames accepted yet.
    Connecting,
    /// Frames flow and turns run.
    Active,
    /// Teardown in progress: final partial turn, then persistence.
    Draining,
    /// Terminal. The connection reservation has been released.
    Closed,
}

impl SessionState {
    fn allows(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Active)
                | (Self::Connecting, Self::Closed)
                | (Self::Active, Self::Draining)
                | (Self::Draining, Self::Closed)
        )
    }
}

/// Per-connection state: buffer, full-call recording, transcript lines,
/// and the connection-count reservation.
///
/// A session is owned exclusively by its processing loop; the manager
/// guards it with one mutex and holds it only across non-await spans.
pub struct AudioSession {
    /// Generated at accept.
    pub connection_id: ConnectionId,
    /// Conversation the call's turns belong to.
    pub conversation_id: ConversationId,
    /// Owning user.
    pub user_id: UserId,
    /// External call identifier.
    pub call_id: CallId,
    /// Lifecycle state.
    pub state: SessionState,
    /// Unflushed audio awaiting the next turn boundary.
    pub buffer: AudioBuffer,
    /// When the connection was admitted.
    pub created_at: DateTime<Utc>,
    /// Last frame or completed turn.
    pub last_activity_at: DateTime<Utc>,
    recording: BytesMut,
    transcript: Vec<String>,
    permit: Option<ConnectionPermit>,
}

impl AudioSession {
    /// Create a session in `Connecting`, holding its connection permit.
    #[must_use]
    pub fn new(
        user_id: UserId,
        call_id: CallId,
        permit: ConnectionPermit,
        bytes_per_second: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            connection_id: ConnectionId::generate(),
            conversation_id: ConversationId::from(format!("voice:{call_id}")),
            user_id,
            call_id,
            state: SessionState::Connecting,
            buffer: AudioBuffer::new(bytes_per_second),
            created_at: now,
            last_activity_at: now,
            recording: BytesMut::new(),
            transcript: Vec::new(),
            permit: Some(permit),
        }
    }

    /// Move to `next`, refusing edges the lifecycle does not allow.
    pub fn transition(&mut self, next: SessionState) -> Result<(), VoiceError> {
        if !self.state.allows(next) {
            return Err(VoiceError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Append one media frame to the turn buffer and the call recording.
    pub fn append_frame(&mut self, frame: &[u8]) {
        self.buffer.push(frame);
        self.recording.extend_from_slice(frame);
        self.touch();
    }

    /// Record one completed exchange for the call transcript.
    pub fn record_exchange(&mut self, inbound: &str, outbound: &str) {
        self.transcript.push(format!("caller: {inbound}"));
        self.transcript.push(format!("agent: {outbound}"));
        self.touch();
    }

    /// Bump `last_activity_at`, keeping it monotonically non-decreasing.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }

    /// Seconds since the last frame or completed turn.
    #[must_use]
    pub fn idle_secs(&self) -> u64 {
        (Utc::now() - self.last_activity_at).num_seconds().max(0) as u64
    }

    /// Take the full-call recording, leaving it empty.
    pub fn take_recording(&mut self) -> Bytes {
        self.recording.split().freeze()
    }

    /// Full transcript so far, one line per utterance.
    #[must_use]
    pub fn transcript_text(&self) -> String {
        self.transcript.join("\n")
    }

    /// Release the connection-count reservation. Safe to call twice;
    /// only the first call decrements.
    pub fn release_permit(&mut self) {
        if let Some(permit) = self.permit.take() {
            permit.release();
        }
    }
}
