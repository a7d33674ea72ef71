//! Replicated domain entities.
//!
//! Every entity carries a globally unique identifier assigned by the service
//! that owns it. Replicas are keyed by that identifier and never invent their
//! own: a replica row exists only because an event from the owning service
//! created it.
//!
//! Field names match the JSON wire payloads exactly, so these types double as
//! the nested payload inside an [`EventEnvelope`](crate::event::EventEnvelope).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A payload that can ride inside an event envelope and live in a replica
/// store.
///
/// [`KIND`](Replicated::KIND) is the nested JSON key on the wire (`"book"`,
/// `"user"`, `"borrowed_book"`); [`NAME`](Replicated::NAME) is the
/// human-readable entity name used in log messages and errors.
pub trait Replicated: Clone + Send + Sync + 'static {
    /// Nested payload key in the event envelope.
    const KIND: &'static str;
    /// Entity name for logs and errors.
    const NAME: &'static str;

    /// The origin-assigned identifier.
    fn id(&self) -> &str;
}

/// A book. The catalog service is authoritative; the lending service holds a
/// replica driven by incoming `book.*` events plus its own availability-flip
/// writes, which it re-publishes back to the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Origin-assigned identifier (catalog service).
    pub id: String,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Publication date.
    pub published_date: NaiveDate,
    /// Publisher.
    pub publisher: String,
    /// Category.
    pub category: String,
    /// Whether the book is currently available for borrowing.
    pub is_available: bool,
}

impl Replicated for Book {
    const KIND: &'static str = "book";
    const NAME: &'static str = "Book";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Partial book payload for the availability-flip event published by the
/// lending service on `book.updated`. It carries only the fields the catalog
/// needs to apply the flip; the envelope omits `action`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookAvailability {
    /// Identifier of the book being flipped.
    pub id: String,
    /// New availability flag.
    pub is_available: bool,
}

impl Replicated for BookAvailability {
    const KIND: &'static str = "book";
    const NAME: &'static str = "Book";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A library user. The lending service is authoritative; the catalog service
/// holds a replica driven by `user.*` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Origin-assigned identifier (lending service).
    pub id: String,
    /// Unique email address.
    pub email: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Active flag.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Last login timestamp.
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl Replicated for User {
    const KIND: &'static str = "user";
    const NAME: &'static str = "User";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A borrow record. The lending service is authoritative; the catalog service
/// holds a replica for reporting, created by `borrowed_book.created` events.
///
/// On the wire `user` and `book` are identifiers. The consuming side resolves
/// both against its local replicas before creating the record; if either is
/// absent the event is abandoned and no partial record is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BorrowedBook {
    /// Origin-assigned identifier (lending service).
    pub id: String,
    /// Identifier of the borrowing user.
    pub user: String,
    /// Identifier of the borrowed book.
    pub book: String,
    /// When the book was borrowed.
    pub borrowed_date: DateTime<Utc>,
    /// When the book is due back.
    pub due_date: DateTime<Utc>,
}

impl Replicated for BorrowedBook {
    const KIND: &'static str = "borrowed_book";
    const NAME: &'static str = "BorrowedBook";

    fn id(&self) -> &str {
        &self.id
    }
}
