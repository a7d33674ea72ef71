//! Publisher seam between domain code and the broker client.
//!
//! Domain code that re-publishes its own mutations (the outbound modules in
//! `shelfsync-catalog` and `shelfsync-lending`) talks to this trait, not to
//! the AMQP client directly. Production wires in the lapin-backed publisher
//! from `shelfsync-broker`; tests use the capturing publisher from
//! `shelfsync-testing`.
//!
//! Publishing is fire-and-forget with at-most-once semantics: there is no
//! outbound queue, and a failed publish is logged and absorbed; the local
//! mutation that triggered it is never rolled back.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by a publish attempt.
///
/// These are terminal from the caller's point of view: the messaging layer
/// has already exhausted whatever recovery it was going to do (reconnect plus
/// a single retry) before returning one of these.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    /// The broker connection is not live and the event was not sent.
    #[error("connection is not alive, event for '{routing_key}' dropped")]
    NotConnected {
        /// Routing key of the dropped event.
        routing_key: String,
    },

    /// The send itself failed.
    #[error("failed to publish event for '{routing_key}': {reason}")]
    Failed {
        /// Routing key of the failed event.
        routing_key: String,
        /// Broker-reported reason.
        reason: String,
    },
}

/// Something that can publish a replication event on a routing key.
///
/// The event is the already-serialized JSON envelope; the implementation
/// stamps the publish timestamp into it before the send. Uses explicit
/// `Pin<Box<dyn Future>>` returns so the trait stays dyn-compatible
/// (`Arc<dyn EventPublisher>` is the shape the outbound modules hold).
pub trait EventPublisher: Send + Sync {
    /// Publish `event` on `routing_key`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the connection is down or the send
    /// fails. Callers log and absorb the error; it never propagates into
    /// domain logic.
    fn publish(
        &self,
        routing_key: &str,
        event: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>>;
}
