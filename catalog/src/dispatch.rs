//! The catalog's inbound routing table.

use shelfsync_broker::DispatchTable;
use shelfsync_core::event::{exchanges, routing};
use std::sync::Arc;

use crate::handlers::{BookAvailabilityHandler, BorrowedBookCreatedHandler, UserEventHandler};
use crate::state::CatalogReplica;

/// Dispatch table the catalog consumer runs against the lending exchange.
///
/// All three `user.*` keys share one handler instance; the envelope's action
/// field disambiguates.
#[must_use]
pub fn inbound_dispatch_table(state: Arc<CatalogReplica>) -> DispatchTable {
    let users: Arc<dyn shelfsync_broker::EventHandler> =
        Arc::new(UserEventHandler::new(Arc::clone(&state)));

    DispatchTable::new(exchanges::LENDING)
        .route(
            routing::BOOK_UPDATED,
            Arc::new(BookAvailabilityHandler::new(Arc::clone(&state))),
        )
        .route(
            routing::BORROWED_BOOK_CREATED,
            Arc::new(BorrowedBookCreatedHandler::new(Arc::clone(&state))),
        )
        .route(routing::USER_CREATED, Arc::clone(&users))
        .route(routing::USER_UPDATED, Arc::clone(&users))
        .route(routing::USER_DELETED, users)
}
