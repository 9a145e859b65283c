//! # parley-router
//!
//! Agent registry and routing decision engine.
//!
//! Every turn, the router picks the specialized agent that answers:
//!
//! 1. A confident current agent keeps the conversation (no fan-out).
//! 2. Otherwise all active agents score the message concurrently and the
//!    highest confidence wins, ties broken by fixed category priority.
//! 3. A weak winner is overridden by the fallback agent.
//!
//! The chosen agent's answer call runs under a per-call timeout with
//! retry + backoff for transient failures only.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `provider` | `ModelProvider` capability trait (`confidence`, `invoke`) |
//! | `registry` | Validated set of agent descriptors + their providers |
//! | `router` | Selection algorithm and the retried answer call |
//!
//! ## Crate Position
//!
//! Depends on parley-core/parley-settings. Depended on by: parley-runtime.

#![deny(unsafe_code)]

pub mod errors;
pub mod provider;
pub mod registry;
pub mod router;

pub use errors::RouterError;
pub use provider::ModelProvider;
#[cfg(any(test, feature = "test-support"))]
pub use provider::MockModelProvider;
pub use registry::{AgentRegistry, RegisteredAgent};
pub use router::{Router, RoutingDecision, SelectionPath};
