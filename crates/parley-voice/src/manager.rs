//! Connection registry and the per-session turn loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use parley_core::ids::{CallId, ConnectionId, UserId};
use parley_core::message::{Channel, NormalizedMessage};
use parley_guard::AdmissionError;
use parley_runtime::Pipeline;
use parley_settings::VoiceSettings;
use parley_store::{CallRecord, ObjectStore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::errors::{Result, VoiceError};
use crate::session::{AudioSession, SessionState};
use crate::speech::SpeechProvider;

/// One registered connection: the session itself plus the gate that
/// keeps its turns strictly sequential.
struct SessionSlot {
    session: Mutex<AudioSession>,
    turn_gate: tokio::sync::Mutex<()>,
}

/// Owns every live voice connection.
///
/// The registry lock covers only insert/lookup/remove; all turn work
/// happens against the per-session slot, so connections never block
/// each other.
pub struct SessionManager {
    pipeline: Arc<Pipeline>,
    speech: Arc<dyn SpeechProvider>,
    objects: Arc<dyn ObjectStore>,
    settings: VoiceSettings,
    sessions: Mutex<HashMap<ConnectionId, Arc<SessionSlot>>>,
}

impl SessionManager {
    /// Assemble a manager over shared components.
    #[must_use]
    pub fn new(
        pipeline: Arc<Pipeline>,
        speech: Arc<dyn SpeechProvider>,
        objects: Arc<dyn ObjectStore>,
        settings: VoiceSettings,
    ) -> Self {
        Self {
            pipeline,
            speech,
            objects,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Live session count.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Admit a new connection for `user_id`.
    ///
    /// Block status is checked before anything else; the connection-count
    /// reservation is taken before the session exists, so a denied caller
    /// never reaches `Active`.
    #[instrument(skip(self), fields(user_id = %user_id, call_id = %call_id))]
    pub fn accept(
        &self,
        user_id: UserId,
        call_id: CallId,
        source_ip: Option<&str>,
    ) -> Result<ConnectionId> {
        if let Some(ip) = source_ip {
            if self.pipeline.guard().is_blocked(ip) {
                counter!("voice_accepts_denied_total", "reason" => "blocked").increment(1);
                return Err(VoiceError::Admission(AdmissionError::Blocked {
                    ip: ip.to_string(),
                }));
            }
        }
        let permit = self.pipeline.guard().acquire_connection(user_id.as_str())?;

        let mut session = AudioSession::new(
            user_id,
            call_id,
            permit,
            self.settings.bytes_per_second,
        );
        session.transition(SessionState::Active)?;
        let connection_id = session.connection_id.clone();

        let slot = Arc::new(SessionSlot {
            session: Mutex::new(session),
            turn_gate: tokio::sync::Mutex::new(()),
        });
        let _ = self.sessions.lock().insert(connection_id.clone(), slot);
        gauge!("voice_sessions_active").increment(1.0);
        info!(connection_id = %connection_id, "voice session accepted");
        Ok(connection_id)
    }

    /// Feed one media frame into a session.
    ///
    /// Returns the reply frames when this frame crossed a turn boundary,
    /// an empty vec otherwise. A frame arriving while a turn is in
    /// flight buffers and returns immediately; the in-flight call drains
    /// any backlog that crossed the threshold before it releases the
    /// turn gate.
    #[instrument(skip(self, frame), fields(connection_id = %connection_id, frame_len = frame.len()))]
    pub async fn ingest_frame(
        &self,
        connection_id: &ConnectionId,
        frame: &[u8],
    ) -> Result<Vec<Bytes>> {
        let slot = self.slot(connection_id)?;

        // Append under the session lock and, if this frame crosses the
        // turn boundary while no turn is in flight, drain in the same
        // critical section so the drain is atomic.
        let pending = {
            let mut session = slot.session.lock();
            if session.state != SessionState::Active {
                return Err(VoiceError::NotActive {
                    state: session.state,
                });
            }
            session.append_frame(frame);
            if session.buffer.duration_ms() >= self.settings.turn_threshold_ms {
                match slot.turn_gate.try_lock() {
                    Ok(gate) => Some((gate, session.buffer.drain())),
                    // Turn in flight; this frame stays buffered.
                    Err(_) => None,
                }
            } else {
                None
            }
        };

        let Some((gate, audio)) = pending else {
            return Ok(Vec::new());
        };
        let mut frames = self.run_turn(&slot, audio).await?;

        // Frames buffered during the turn may have crossed the threshold
        // themselves; drain them before the gate frees so a silent caller
        // is not left with an over-threshold buffer.
        loop {
            let backlog = {
                let mut session = slot.session.lock();
                if session.state == SessionState::Active
                    && session.buffer.duration_ms() >= self.settings.turn_threshold_ms
                {
                    Some(session.buffer.drain())
                } else {
                    None
                }
            };
            let Some(audio) = backlog else { break };
            frames.extend(self.run_turn(&slot, audio).await?);
        }
        drop(gate);
        Ok(frames)
    }

    /// Stop a session: drain, persist, release.
    ///
    /// Waits out any in-flight turn, force-converts the unflushed buffer
    /// into a best-effort final turn (failures are logged, never
    /// retried), writes the call record with its audio and transcript
    /// blobs, and releases the connection reservation exactly once. Both
    /// explicit stop signals and transport disconnects land here.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn stop(&self, connection_id: &ConnectionId) -> Result<CallRecord> {
        let slot = self.slot(connection_id)?;
        {
            let mut session = slot.session.lock();
            session.transition(SessionState::Draining)?;
        }

        // Strictly sequential even on the way down.
        let gate = slot.turn_gate.lock().await;

        let leftover = slot.session.lock().buffer.drain();
        if !leftover.is_empty() {
            let budget = Duration::from_millis(self.settings.turn_budget_ms);
            match timeout(budget, self.turn(&slot, leftover)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "final partial turn failed"),
                Err(_) => warn!("final partial turn overran the turn budget"),
            }
        }
        drop(gate);

        let record = self.persist_call(&slot);
        {
            let mut session = slot.session.lock();
            session.transition(SessionState::Closed)?;
            session.release_permit();
        }

        let _ = self.sessions.lock().remove(connection_id);
        gauge!("voice_sessions_active").decrement(1.0);
        counter!("voice_calls_completed_total").increment(1);
        info!(call_id = %record.call_id, duration_ms = record.duration_ms, "voice session closed");
        Ok(record)
    }

    /// Tear down every active session idle past the configured timeout.
    ///
    /// Returns the connection ids that were closed.
    pub async fn purge_idle(&self) -> Vec<ConnectionId> {
        let stale: Vec<ConnectionId> = {
            let sessions = self.sessions.lock();
            sessions
                .iter()
                .filter(|(_, slot)| {
                    let session = slot.session.lock();
                    session.state == SessionState::Active
                        && session.idle_secs() >= self.settings.idle_timeout_secs
                })
                .map(|(id, _)| id.clone())
                .collect()
        };

        for connection_id in &stale {
            info!(connection_id = %connection_id, "closing idle voice session");
            if let Err(e) = self.stop(connection_id).await {
                warn!(connection_id = %connection_id, error = %e, "idle teardown failed");
            }
        }
        stale
    }

    /// Spawn the idle-session reaper. Runs until `token` is cancelled.
    pub fn spawn_idle_reaper(
        self: &Arc<Self>,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let period = Duration::from_secs(manager.settings.idle_timeout_secs.clamp(1, 60));
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = manager.purge_idle().await;
                    }
                }
            }
        })
    }

    fn slot(&self, connection_id: &ConnectionId) -> Result<Arc<SessionSlot>> {
        self.sessions
            .lock()
            .get(connection_id)
            .cloned()
            .ok_or_else(|| VoiceError::UnknownSession(connection_id.clone()))
    }

    /// One turn under the session's latency budget. Overruns surface as
    /// a turn-level timeout; the session stays active.
    async fn run_turn(&self, slot: &Arc<SessionSlot>, audio: Bytes) -> Result<Vec<Bytes>> {
        let budget = Duration::from_millis(self.settings.turn_budget_ms);
        match timeout(budget, self.turn(slot, audio)).await {
            Ok(result) => result,
            Err(_) => {
                counter!("voice_turn_timeouts_total").increment(1);
                warn!("turn overran its budget");
                Err(VoiceError::TurnBudget {
                    budget_ms: self.settings.turn_budget_ms,
                })
            }
        }
    }

    /// Transcribe, run the pipeline, synthesize, chunk.
    async fn turn(&self, slot: &Arc<SessionSlot>, audio: Bytes) -> Result<Vec<Bytes>> {
        let text = self.speech.transcribe(audio).await?;
        let (conversation_id, user_id) = {
            let session = slot.session.lock();
            (session.conversation_id.clone(), session.user_id.clone())
        };

        let message = NormalizedMessage::new(conversation_id, user_id, Channel::Voice, text.clone());
        let outcome = self.pipeline.handle_message(message).await?;

        let reply_audio = self.speech.synthesize(&outcome.reply.content).await?;
        {
            let mut session = slot.session.lock();
            session.record_exchange(&text, &outcome.reply.content);
        }
        counter!("voice_turns_total").increment(1);
        Ok(chunk_frames(reply_audio, self.settings.frame_bytes))
    }

    /// Write the call record and its blobs. Persistence failures here
    /// are logged; teardown continues regardless.
    fn persist_call(&self, slot: &Arc<SessionSlot>) -> CallRecord {
        let (call_id, conversation_id, recording, transcript) = {
            let mut session = slot.session.lock();
            (
                session.call_id.clone(),
                session.conversation_id.clone(),
                session.take_recording(),
                session.transcript_text(),
            )
        };

        let audio_ref = if recording.is_empty() {
            None
        } else {
            match self.objects.put_once("calls/audio", &recording) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "audio blob export failed");
                    None
                }
            }
        };
        let transcript_ref = if transcript.is_empty() {
            None
        } else {
            match self.objects.put_once("calls/transcripts", transcript.as_bytes()) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "transcript export failed");
                    None
                }
            }
        };

        let record = CallRecord {
            call_id,
            conversation_id,
            duration_ms: recording.len() as u64 * 1000 / self.settings.bytes_per_second.max(1),
            transcript_ref,
            audio_ref,
            created_at: Utc::now(),
        };
        if let Err(e) = self.pipeline.store().append_call_record(&record) {
            counter!("voice_call_record_failures_total").increment(1);
            warn!(error = %e, "call record append failed");
        }
        record
    }
}

/// Split reply audio into ordered frames of at most `frame_bytes`.
fn chunk_frames(audio: Bytes, frame_bytes: usize) -> Vec<Bytes> {
    let size = frame_bytes.max(1);
    let mut frames = Vec::with_capacity(audio.len().div_ceil(size));
    let mut rest = audio;
    while rest.len() > size {
        frames.push(rest.split_to(size));
    }
    if !rest.is_empty() {
        frames.push(rest);
    }
    frames
}
