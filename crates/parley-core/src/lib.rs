//! # parley-core
//!
//! Foundation types, errors, branded IDs, and utilities for the Parley
//! conversational backend.
//!
//! This crate provides the shared vocabulary that all other Parley crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::ConversationId`], [`ids::UserId`],
//!   [`ids::AgentId`], [`ids::ConnectionId`], [`ids::CallId`] as newtypes
//! - **Messages**: [`message::NormalizedMessage`] (channel-adapter inbound
//!   shape), [`message::AgentReply`], [`message::Turn`]
//! - **Context**: [`context::ConversationContext`] — bounded recent-history
//!   state for one conversation
//! - **Agents**: [`agent::AgentDescriptor`], [`agent::AgentCategory`],
//!   [`agent::InvocationConfig`]
//! - **Errors**: [`errors::ModelError`] with retryability classification
//! - **Retry**: [`retry::RetryConfig`] and backoff calculation
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other parley crates.

#![deny(unsafe_code)]

pub mod agent;
pub mod context;
pub mod errors;
pub mod ids;
pub mod message;
pub mod retry;
