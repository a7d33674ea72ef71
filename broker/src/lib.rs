//! AMQP broker client for Shelfsync.
//!
//! This crate owns every broker-facing concern of the replication subsystem:
//!
//! - [`BrokerConfig`]: environment-sourced connection settings with local
//!   defaults, plus the explicit [`AckPolicy`] choice
//! - [`RetryPolicy`]: the bounded, linear-backoff budget shared by connection
//!   establishment and the consume loop's recovery path
//! - [`AmqpClient`]: one connection + channel per exchange, lazily-checked
//!   liveness, publish with a single reconnect-and-retry, queue subscription
//! - [`ConsumerLoop`]: sequential delivery processing with transparent
//!   reconnection and cooperative shutdown
//! - [`DispatchTable`]: the startup-validated routing-key → handler map
//! - [`MessagingContext`]: explicit per-process registry of clients, built
//!   once at startup and torn down explicitly
//! - [`Shutdown`]: the broadcast token fired by the signal listener
//!
//! # Delivery semantics
//!
//! **At-most-once** by default ([`AckPolicy::AckBeforeProcess`]): the broker
//! acknowledges at delivery time, before the handler runs, so a handler
//! failure or a crash mid-handler loses the event rather than redelivering
//! it. Handlers treat partial failure as "log and move on". The alternative
//! [`AckPolicy::AckAfterSuccess`] acknowledges only after the handler
//! succeeds (at-least-once; requires the handlers' idempotency to tolerate
//! redelivery). Either way there is no outbound queue: events produced while
//! the broker is unreachable beyond the retry budget are lost, and the
//! originating domain mutation is never rolled back.
//!
//! # Concurrency model
//!
//! Publishing and consuming happen in separate processes with separate
//! connections. The consume loop handles one message at a time; reconnection
//! is synchronous and blocking with respect to that loop.

pub mod config;
pub mod connection;
pub mod consumer;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod retry;
pub mod shutdown;

pub use config::{AckPolicy, BrokerConfig};
pub use connection::{AmqpClient, AmqpPublisher};
pub use consumer::ConsumerLoop;
pub use context::{MessagingContext, MessagingContextBuilder};
pub use dispatch::{DispatchTable, EventHandler, HandlerError};
pub use error::BrokerError;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use shutdown::{listen_for_signals, Shutdown};
