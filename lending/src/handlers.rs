//! Inbound handlers for deliveries from the catalog exchange.
//!
//! The lending service consumes only full-payload `book.*` events. The same
//! idempotency rules as everywhere else apply: create overwrites, update
//! requires presence, delete tolerates absence.

use shelfsync_broker::{EventHandler, HandlerError};
use shelfsync_core::entity::Book;
use shelfsync_core::event::{Action, EventEnvelope};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

use crate::state::LendingReplica;

/// Applies `book.created` / `book.updated` / `book.deleted` to the book
/// replica. One handler instance serves all three routing keys.
pub struct BookEventHandler {
    state: Arc<LendingReplica>,
}

impl BookEventHandler {
    /// Handler over the shared lending state.
    #[must_use]
    pub fn new(state: Arc<LendingReplica>) -> Self {
        Self { state }
    }

    async fn apply(&self, body: &[u8]) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<Book> =
            serde_json::from_slice(body).map_err(|e| HandlerError::Malformed(e.to_string()))?;
        let Some(action) = envelope.action else {
            return Err(HandlerError::Malformed(
                "book event is missing the action field".to_string(),
            ));
        };
        let book = envelope.payload;

        match action {
            Action::Created => {
                info!(id = %book.id, "Created book: {} by {}", book.title, book.author);
                self.state.books.upsert(book).await;
            }
            Action::Updated => {
                let (title, author) = (book.title.clone(), book.author.clone());
                self.state.books.update(book).await?;
                info!("Updated book: {title} by {author}");
            }
            Action::Deleted => {
                let removed = self.state.books.remove(&book.id).await;
                info!(id = %book.id, removed, "Deleted book: {} by {}", book.title, book.author);
            }
        }
        Ok(())
    }
}

impl EventHandler for BookEventHandler {
    fn handle<'a>(
        &'a self,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(self.apply(body))
    }
}
