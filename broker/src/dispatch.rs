//! Handler trait and the routing-key dispatch table.
//!
//! Each service declares one table per exchange it consumes: an explicit
//! list of (routing key, handler) pairs, validated at startup. An empty
//! table is a configuration error and fails fast, unlike runtime delivery
//! errors, which are logged and absorbed by the consume loop.

use crate::error::BrokerError;
use shelfsync_core::store::ReplicaError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Why a handler abandoned an event.
///
/// All of these are terminal for the event in question: under at-most-once
/// delivery the event is dropped, not retried, and the consume loop moves on
/// to the next delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The payload was not the JSON shape this handler expects. Rejected and
    /// logged instead of being allowed to escape the consume loop.
    #[error("malformed event payload: {0}")]
    Malformed(String),

    /// The replica lookup the event targets found nothing.
    #[error(transparent)]
    Replica(#[from] ReplicaError),

    /// A cross-entity event referenced an entity that does not exist locally.
    /// No partial record is created.
    #[error("failed to create {record}: {kind} with ID {id} doesn't exist")]
    MissingReference {
        /// The record that was being created.
        record: &'static str,
        /// Kind of the missing referenced entity.
        kind: &'static str,
        /// Identifier of the missing referenced entity.
        id: String,
    },
}

/// An inbound event handler: applies one delivery's body to local state,
/// idempotently.
///
/// Explicit `Pin<Box<dyn Future>>` return keeps the trait dyn-compatible
/// so dispatch tables can hold `Arc<dyn EventHandler>`.
pub trait EventHandler: Send + Sync {
    /// Apply the raw UTF-8 JSON body of one delivery.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the event is abandoned. The consume loop
    /// logs the error and continues; nothing a handler returns can stop the
    /// loop or trigger a redelivery.
    fn handle<'a>(
        &'a self,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;
}

/// Routing-key → handler map for one exchange.
pub struct DispatchTable {
    exchange: String,
    routes: Vec<(String, Arc<dyn EventHandler>)>,
}

impl DispatchTable {
    /// Empty table for an exchange. Add routes with [`DispatchTable::route`]
    /// and validate before use.
    #[must_use]
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            routes: Vec::new(),
        }
    }

    /// Add a route. Later routes for the same key shadow earlier ones on
    /// lookup, which never happens in a well-formed table.
    #[must_use]
    pub fn route(mut self, routing_key: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.routes.push((routing_key.into(), handler));
        self
    }

    /// Exchange this table routes for.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Startup validation: a consumer command pointed at an exchange with an
    /// empty table is misconfigured.
    ///
    /// # Errors
    ///
    /// [`BrokerError::EmptyDispatchTable`] when no routes are defined.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.routes.is_empty() {
            return Err(BrokerError::EmptyDispatchTable {
                exchange: self.exchange.clone(),
            });
        }
        Ok(())
    }

    /// Handler for a routing key, if one is registered.
    #[must_use]
    pub fn handler(&self, routing_key: &str) -> Option<&Arc<dyn EventHandler>> {
        self.routes
            .iter()
            .find(|(key, _)| key == routing_key)
            .map(|(_, handler)| handler)
    }

    /// All routing keys, in registration order.
    pub fn routing_keys(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(key, _)| key.as_str())
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    impl EventHandler for NoopHandler {
        fn handle<'a>(
            &'a self,
            _body: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn empty_table_is_a_startup_error() {
        let table = DispatchTable::new("catalog");
        assert!(matches!(
            table.validate(),
            Err(BrokerError::EmptyDispatchTable { .. })
        ));
    }

    #[test]
    fn routes_resolve_by_routing_key() {
        let table = DispatchTable::new("lending")
            .route("user.created", Arc::new(NoopHandler))
            .route("user.deleted", Arc::new(NoopHandler));

        assert!(table.validate().is_ok());
        assert_eq!(table.len(), 2);
        assert!(table.handler("user.created").is_some());
        assert!(table.handler("book.updated").is_none());
        assert_eq!(
            table.routing_keys().collect::<Vec<_>>(),
            vec!["user.created", "user.deleted"]
        );
    }
}
