//! Outbound `book.*` events on the catalog exchange.
//!
//! Called from the catalog's own mutation paths after the local write has
//! committed. Publishing is fire-and-forget: a failure is logged and
//! absorbed, the local mutation stands.

use shelfsync_core::entity::Book;
use shelfsync_core::event::{Action, EventEnvelope};
use shelfsync_core::publisher::EventPublisher;
use tracing::error;

/// Publish a full-payload book event on `book.<action>`.
pub async fn publish_book_event(publisher: &dyn EventPublisher, book: &Book, action: Action) {
    let routing_key = format!("book.{action}");
    let envelope = EventEnvelope::new(book.clone(), action);
    let event = match serde_json::to_value(&envelope) {
        Ok(event) => event,
        Err(e) => {
            error!(id = %book.id, %routing_key, "Failed to encode {routing_key} event: {e}");
            return;
        }
    };

    if let Err(e) = publisher.publish(&routing_key, event).await {
        error!(id = %book.id, %routing_key, "Failed to publish {routing_key} event for {}: {e}", book.id);
    }
}
