//! Inbound handlers for deliveries from the lending exchange.
//!
//! Every handler is idempotent under redelivery: create overwrites, update
//! requires presence, delete tolerates absence. Errors returned here are
//! logged by the consumer loop and the event is dropped; nothing a handler
//! does can stop consumption.

use serde::de::DeserializeOwned;
use shelfsync_broker::{EventHandler, HandlerError};
use shelfsync_core::entity::{Book, BookAvailability, BorrowedBook, Replicated, User};
use shelfsync_core::event::{Action, EventEnvelope};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

use crate::state::CatalogReplica;

fn parse<T>(body: &[u8]) -> Result<EventEnvelope<T>, HandlerError>
where
    T: Replicated + DeserializeOwned,
{
    serde_json::from_slice(body).map_err(|e| HandlerError::Malformed(e.to_string()))
}

/// Applies `user.created` / `user.updated` / `user.deleted` to the user
/// replica. One handler instance serves all three routing keys; the envelope's
/// `action` field selects the mutation.
pub struct UserEventHandler {
    state: Arc<CatalogReplica>,
}

impl UserEventHandler {
    /// Handler over the shared catalog state.
    #[must_use]
    pub fn new(state: Arc<CatalogReplica>) -> Self {
        Self { state }
    }

    async fn apply(&self, body: &[u8]) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<User> = parse(body)?;
        let Some(action) = envelope.action else {
            return Err(HandlerError::Malformed(
                "user event is missing the action field".to_string(),
            ));
        };
        let user = envelope.payload;

        match action {
            Action::Created => {
                info!(email = %user.email, "Created user: {}", user.email);
                self.state.users.upsert(user).await;
            }
            Action::Updated => {
                let email = user.email.clone();
                self.state.users.update(user).await?;
                info!(email = %email, "Updated user: {email}");
            }
            Action::Deleted => {
                let removed = self.state.users.remove(&user.id).await;
                info!(id = %user.id, removed, "Deleted user: {}", user.email);
            }
        }
        Ok(())
    }
}

impl EventHandler for UserEventHandler {
    fn handle<'a>(
        &'a self,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(self.apply(body))
    }
}

/// Applies `borrowed_book.created`.
///
/// The payload references a user and a book by id. Both must already exist in
/// the local replicas; if either is missing the event is abandoned without
/// creating a partial record, and the error names the first missing
/// reference.
pub struct BorrowedBookCreatedHandler {
    state: Arc<CatalogReplica>,
}

impl BorrowedBookCreatedHandler {
    /// Handler over the shared catalog state.
    #[must_use]
    pub fn new(state: Arc<CatalogReplica>) -> Self {
        Self { state }
    }

    async fn apply(&self, body: &[u8]) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<BorrowedBook> = parse(body)?;
        let record = envelope.payload;

        let Some(user) = self.state.users.get(&record.user).await else {
            return Err(HandlerError::MissingReference {
                record: BorrowedBook::NAME,
                kind: User::NAME,
                id: record.user,
            });
        };
        let Some(book) = self.state.books.get(&record.book).await else {
            return Err(HandlerError::MissingReference {
                record: BorrowedBook::NAME,
                kind: Book::NAME,
                id: record.book,
            });
        };

        info!(
            user = %user.id,
            book = %book.id,
            "{} borrowed the book {} by {}",
            user.first_name,
            book.title,
            book.author,
        );
        self.state.borrowed_books.upsert(record).await;
        Ok(())
    }
}

impl EventHandler for BorrowedBookCreatedHandler {
    fn handle<'a>(
        &'a self,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(self.apply(body))
    }
}

/// Applies the availability flip published by the lending service on
/// `book.updated`. The envelope nests only `{id, is_available}` and carries
/// no action; only the flag is touched.
pub struct BookAvailabilityHandler {
    state: Arc<CatalogReplica>,
}

impl BookAvailabilityHandler {
    /// Handler over the shared catalog state.
    #[must_use]
    pub fn new(state: Arc<CatalogReplica>) -> Self {
        Self { state }
    }

    async fn apply(&self, body: &[u8]) -> Result<(), HandlerError> {
        let envelope: EventEnvelope<BookAvailability> = parse(body)?;
        let flip = envelope.payload;

        let updated = self
            .state
            .books
            .update_with(&flip.id, |book| book.is_available = flip.is_available)
            .await?;
        info!(
            id = %updated.id,
            is_available = updated.is_available,
            "Book with ID {} updated (is_available = {})",
            updated.id,
            updated.is_available,
        );
        Ok(())
    }
}

impl EventHandler for BookAvailabilityHandler {
    fn handle<'a>(
        &'a self,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(self.apply(body))
    }
}
