//! # parley-store
//!
//! Two-tier conversation context storage for the Parley backend.
//!
//! Reads hit the fast tier first (TTL cache), fall through to durable
//! storage, and repopulate the cache. Writes land in the fast tier
//! synchronously and mirror to durable storage; a durable failure degrades
//! to a logged durability warning, never a failed turn.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `cache` | `FastCache` trait + in-process TTL implementation |
//! | `durable` | `DurableStore` trait, `CallRecord` |
//! | `sqlite` | Durable implementation: r2d2 pool, migrations, repositories |
//! | `object` | `ObjectStore` trait for audio blobs + in-memory implementation |
//! | `store` | `ContextStore` — the two-tier composition |
//!
//! ## Crate Position
//!
//! Depends only on parley-core/parley-settings. Depended on by:
//! parley-runtime, parley-voice.

#![deny(unsafe_code)]

pub mod cache;
pub mod durable;
pub mod errors;
pub mod object;
pub mod sqlite;
pub mod store;

pub use cache::{FastCache, MemoryCache};
pub use durable::{CallRecord, DurableStore};
pub use errors::{Result, StoreError};
pub use object::{MemoryObjectStore, ObjectStore};
pub use sqlite::SqliteStore;
pub use store::{ContextSource, ContextStore, DurableWriteStatus, LoadedContext, SaveOutcome};
