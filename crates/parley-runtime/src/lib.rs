//! # parley-runtime
//!
//! The turn pipeline: the backend's one entry point for a normalized
//! inbound message.
//!
//! Each turn runs admission, context load, agent selection, the answer
//! call, and persistence in order. Admission and routing failures abort
//! the turn; storage degradation never does — a turn that produced an
//! answer succeeds even when the durable tier is down.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `pipeline` | `Pipeline` — the ordered turn stages |
//! | `errors` | `PipelineError` over the stage errors |
//!
//! ## Crate Position
//!
//! Composes parley-guard, parley-store, and parley-router. Depended on
//! by: parley-voice.

#![deny(unsafe_code)]

pub mod errors;
pub mod pipeline;

pub use errors::{PipelineError, Result};
pub use pipeline::{Pipeline, TurnOutcome};
