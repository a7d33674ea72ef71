//! Outbound events on the lending exchange.
//!
//! Called from the lending service's own mutation paths after the local
//! write has committed. Publishing is fire-and-forget: a failure is logged
//! and absorbed, the local mutation stands.

use shelfsync_core::entity::{BookAvailability, BorrowedBook, User};
use shelfsync_core::event::{Action, EventEnvelope, routing};
use shelfsync_core::publisher::EventPublisher;
use tracing::error;

async fn publish(
    publisher: &dyn EventPublisher,
    routing_key: &str,
    id: &str,
    event: serde_json::Value,
) {
    if let Err(e) = publisher.publish(routing_key, event).await {
        error!(%id, %routing_key, "Failed to publish {routing_key} event for {id}: {e}");
    }
}

/// Publish a full-payload user event on `user.<action>`.
pub async fn publish_user_event(publisher: &dyn EventPublisher, user: &User, action: Action) {
    let routing_key = format!("user.{action}");
    let envelope = EventEnvelope::new(user.clone(), action);
    match serde_json::to_value(&envelope) {
        Ok(event) => publish(publisher, &routing_key, &user.id, event).await,
        Err(e) => error!(id = %user.id, %routing_key, "Failed to encode {routing_key} event: {e}"),
    }
}

/// Publish a new borrow record on `borrowed_book.created`.
pub async fn publish_borrowed_book_created(publisher: &dyn EventPublisher, record: &BorrowedBook) {
    let envelope = EventEnvelope::new(record.clone(), Action::Created);
    match serde_json::to_value(&envelope) {
        Ok(event) => {
            publish(publisher, routing::BORROWED_BOOK_CREATED, &record.id, event).await;
        }
        Err(e) => error!(id = %record.id, "Failed to encode borrowed_book.created event: {e}"),
    }
}

/// Publish an availability flip on `book.updated`.
///
/// This is the one action-less envelope: it nests only `{id, is_available}`
/// so the catalog applies it as a partial update.
pub async fn publish_book_availability(publisher: &dyn EventPublisher, flip: &BookAvailability) {
    let envelope = EventEnvelope::bare(flip.clone());
    match serde_json::to_value(&envelope) {
        Ok(event) => publish(publisher, routing::BOOK_UPDATED, &flip.id, event).await,
        Err(e) => error!(id = %flip.id, "Failed to encode book.updated event: {e}"),
    }
}
