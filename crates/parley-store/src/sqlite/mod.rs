//! SQLite durable-tier implementation.
//!
//! Layout follows one pattern throughout: [`connection`] owns the r2d2
//! pool and migrations; repositories are stateless structs whose methods
//! take `&Connection`; [`SqliteStore`] composes them behind the
//! [`DurableStore`](crate::durable::DurableStore) trait with busy-retry.

pub mod call_repo;
pub mod connection;
pub mod context_repo;
mod store;

pub use connection::{ConnectionPool, PooledConnection, new_in_memory, open_pool, run_migrations};
pub use store::SqliteStore;
