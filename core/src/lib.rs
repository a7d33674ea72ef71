//! # Shelfsync Core
//!
//! Core types for the Shelfsync event-replication layer.
//!
//! Two independently owned services, the **catalog** service (authoritative
//! for books) and the **lending** service (authoritative for users and
//! borrowed-book records), keep overlapping local stores eventually
//! consistent without sharing a database. Whenever a service mutates an
//! entity it owns it publishes a change event on its own topic exchange; the
//! other service consumes that event and applies the mutation to its replica.
//!
//! This crate holds everything both sides agree on:
//!
//! - **Entities**: [`Book`], [`User`] and [`BorrowedBook`], keyed by
//!   origin-assigned identifiers that replicas never re-derive
//! - **Event envelopes**: the JSON wire format
//!   `{"<entity>": {…}, "action": "…", "timestamp": "…"}` shared by both
//!   exchanges
//! - **Replica stores**: in-memory, identifier-keyed stores that inbound
//!   event handlers mutate idempotently
//! - **[`EventPublisher`]**: the seam between domain code that wants to emit
//!   an event and the broker client that actually sends it
//!
//! The broker plumbing itself (connection lifecycle, consume loop, retry
//! policy) lives in `shelfsync-broker`; the per-service handlers and dispatch
//! tables live in `shelfsync-catalog` and `shelfsync-lending`.
//!
//! # Consistency model
//!
//! Local consistency is immediate: a service's own mutation is durable before
//! the corresponding event is published. Cross-service consistency is
//! eventual: the remote replica lags by at least one broker round trip, and
//! delivery is at-most-once, so handlers are idempotent in lieu of
//! de-duplication.

pub mod entity;
pub mod event;
pub mod publisher;
pub mod store;

pub use entity::{Book, BorrowedBook, Replicated, User};
pub use event::{Action, EventEnvelope};
pub use publisher::{EventPublisher, PublishError};
pub use store::{ReplicaError, ReplicaStore};
