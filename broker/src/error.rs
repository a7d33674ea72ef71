//! Broker-layer errors.
//!
//! Two families with very different handling: configuration errors (missing
//! client, empty dispatch table, exchange mismatch) are raised at startup and
//! should fail the process fast; runtime delivery errors are logged and
//! absorbed at the messaging boundary and never propagate into domain code.

use thiserror::Error;

/// Errors surfaced by the broker layer.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The connection for this exchange is not alive.
    #[error("broker connection for exchange '{exchange}' is not alive")]
    NotConnected {
        /// Exchange whose connection is down.
        exchange: String,
    },

    /// The messaging context holds no client for this exchange. Returned
    /// instead of implicitly auto-creating one.
    #[error("no broker client initialized for exchange '{exchange}'")]
    NotInitialized {
        /// The unknown exchange name.
        exchange: String,
    },

    /// A subscription command referenced an exchange with no handlers:
    /// a configuration error, raised at startup.
    #[error("no queue event handlers defined for exchange '{exchange}'")]
    EmptyDispatchTable {
        /// Exchange with the empty table.
        exchange: String,
    },

    /// A dispatch table was wired to a client bound to a different exchange.
    #[error("dispatch table for exchange '{table}' given a client for exchange '{client}'")]
    ExchangeMismatch {
        /// Exchange the table routes for.
        table: String,
        /// Exchange the client is bound to.
        client: String,
    },

    /// Declaring, binding or consuming a queue failed.
    #[error("failed to subscribe to queue '{queue}': {reason}")]
    SubscribeFailed {
        /// Queue that could not be subscribed.
        queue: String,
        /// Broker-reported reason.
        reason: String,
    },

    /// Underlying AMQP transport error.
    #[error("transport error: {0}")]
    Transport(#[from] lapin::Error),
}
