//! The lending service's inbound routing table.

use shelfsync_broker::DispatchTable;
use shelfsync_core::event::{exchanges, routing};
use std::sync::Arc;

use crate::handlers::BookEventHandler;
use crate::state::LendingReplica;

/// Dispatch table the lending consumer runs against the catalog exchange.
#[must_use]
pub fn inbound_dispatch_table(state: Arc<LendingReplica>) -> DispatchTable {
    let books: Arc<dyn shelfsync_broker::EventHandler> =
        Arc::new(BookEventHandler::new(state));

    DispatchTable::new(exchanges::CATALOG)
        .route(routing::BOOK_CREATED, Arc::clone(&books))
        .route(routing::BOOK_UPDATED, Arc::clone(&books))
        .route(routing::BOOK_DELETED, books)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_targets_the_catalog_exchange_and_routes_all_keys() {
        let table = inbound_dispatch_table(Arc::new(LendingReplica::new()));

        assert!(table.validate().is_ok());
        assert_eq!(table.exchange(), "catalog");
        assert_eq!(
            table.routing_keys().collect::<Vec<_>>(),
            vec!["book.created", "book.updated", "book.deleted"]
        );
    }
}
