//! # parley-guard
//!
//! Rate limiting and abuse prevention for the Parley backend.
//!
//! Admission runs before any pipeline work: IP block status first, then
//! the policy relevant to the request (request rate for messages,
//! connection cap for real-time audio). All policies are atomic
//! increment-then-compare over a shared [`counters::CounterStore`] —
//! compare-then-increment would race under concurrent admission.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `counters` | `CounterStore` trait + in-process implementation |
//! | `limiter` | Request-rate, connection-cap, and failure-block policies |
//!
//! ## Crate Position
//!
//! Leaf component. Depended on by: parley-runtime, parley-voice.

#![deny(unsafe_code)]

pub mod counters;
pub mod errors;
pub mod limiter;

pub use counters::{CounterStore, MemoryCounters};
pub use errors::AdmissionError;
pub use limiter::{ConnectionPermit, RateLimiter};
