//! # parley-voice
//!
//! Real-time audio session management: a continuous streamed byte
//! transport becomes discrete conversational turns.
//!
//! Each admitted connection gets an [`session::AudioSession`] that walks
//! `Connecting → Active → Draining → Closed`. Frames accumulate in a
//! bounded-latency buffer; crossing the turn threshold drains the buffer
//! atomically, transcribes it, runs the turn pipeline, and emits the
//! synthesized reply as ordered audio frames. Turns within one
//! connection are strictly sequential.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `buffer` | `AudioBuffer` — duration-tracked accumulation, atomic drain |
//! | `session` | `AudioSession` + the `SessionState` machine |
//! | `speech` | `SpeechProvider` collaborator seam (transcribe/synthesize) |
//! | `manager` | `SessionManager` — connection registry and turn loop |
//!
//! ## Crate Position
//!
//! Top of the stack. Composes parley-guard (admission), parley-runtime
//! (turn pipeline), and parley-store (call records, audio blobs).

#![deny(unsafe_code)]

pub mod buffer;
pub mod errors;
pub mod manager;
pub mod session;
pub mod speech;

pub use buffer::AudioBuffer;
pub use errors::{Result, VoiceError};
pub use manager::SessionManager;
pub use session::{AudioSession, SessionState};
#[cfg(any(test, feature = "test-support"))]
pub use speech::MockSpeechProvider;
pub use speech::{SpeechError, SpeechProvider};
