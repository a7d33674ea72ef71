//! # Shelfsync Testing
//!
//! Test doubles and fixtures for the replication layer.
//!
//! - [`CapturingPublisher`] records every publish instead of touching a
//!   broker, so outbound modules can be asserted on routing key and body
//! - [`FailingPublisher`] fails every publish, for exercising the
//!   log-and-absorb path
//! - [`fixtures`] builds valid entities with stable identifiers

use shelfsync_core::publisher::{EventPublisher, PublishError};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::Mutex;

/// Publisher that records `(routing_key, body)` pairs in memory.
#[derive(Debug, Default)]
pub struct CapturingPublisher {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl CapturingPublisher {
    /// Empty capturing publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in publish order.
    pub async fn recorded(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().await.clone()
    }

    /// Number of publishes so far.
    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Whether nothing was published.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl EventPublisher for CapturingPublisher {
    fn publish(
        &self,
        routing_key: &str,
        event: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        let routing_key = routing_key.to_string();
        Box::pin(async move {
            self.events.lock().await.push((routing_key, event));
            Ok(())
        })
    }
}

/// Publisher that rejects every event, as a broker with a dead connection
/// would.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingPublisher;

impl EventPublisher for FailingPublisher {
    fn publish(
        &self,
        routing_key: &str,
        _event: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        let routing_key = routing_key.to_string();
        Box::pin(async move { Err(PublishError::NotConnected { routing_key }) })
    }
}

/// Entity builders with stable test identifiers.
pub mod fixtures {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use shelfsync_core::entity::{Book, BorrowedBook, User};

    fn fixed_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// An available book with the given id.
    #[must_use]
    pub fn book(id: &str) -> Book {
        Book {
            id: id.to_string(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            published_date: NaiveDate::from_ymd_opt(1965, 8, 1).unwrap_or_default(),
            publisher: "Chilton".to_string(),
            category: "sci-fi".to_string(),
            is_available: true,
        }
    }

    /// An active user with the given id; the email embeds the id so
    /// assertions can tell records apart.
    #[must_use]
    pub fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id.to_lowercase()),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            is_active: Some(true),
            last_login: None,
        }
    }

    /// A borrow record linking the given user and book ids.
    #[must_use]
    pub fn borrowed_book(id: &str, user_id: &str, book_id: &str) -> BorrowedBook {
        BorrowedBook {
            id: id.to_string(),
            user: user_id.to_string(),
            book: book_id.to_string(),
            borrowed_date: fixed_instant(),
            due_date: fixed_instant() + chrono::Duration::days(9),
        }
    }
}
