//! End-to-end handler behavior against the catalog's in-memory state.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use shelfsync_broker::{EventHandler, HandlerError};
use shelfsync_catalog::handlers::{
    BookAvailabilityHandler, BorrowedBookCreatedHandler, UserEventHandler,
};
use shelfsync_catalog::CatalogReplica;
use shelfsync_core::store::ReplicaError;
use shelfsync_testing::fixtures;
use std::sync::Arc;

fn body(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap_or_default()
}

fn user_event(action: &str, id: &str, email: &str) -> Vec<u8> {
    body(json!({
        "user": {
            "id": id,
            "email": email,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "is_active": true,
        },
        "action": action,
        "timestamp": "2024-01-01T00:00:00Z",
    }))
}

#[tokio::test]
async fn availability_flip_updates_only_the_flag() {
    let state = Arc::new(CatalogReplica::new());
    state.books.upsert(fixtures::book("B1")).await;
    let handler = BookAvailabilityHandler::new(Arc::clone(&state));

    let event = body(json!({"book": {"id": "B1", "is_available": false}}));
    handler.handle(&event).await.unwrap();
    // Redelivery of the same flip lands on the same state.
    handler.handle(&event).await.unwrap();

    let book = state.books.get("B1").await.unwrap();
    assert!(!book.is_available);
    assert_eq!(book.title, fixtures::book("B1").title);
}

#[tokio::test]
async fn availability_flip_for_unknown_book_reports_not_found() {
    let state = Arc::new(CatalogReplica::new());
    let handler = BookAvailabilityHandler::new(Arc::clone(&state));

    let result = handler
        .handle(&body(json!({"book": {"id": "B404", "is_available": true}})))
        .await;

    assert_eq!(
        result,
        Err(HandlerError::Replica(ReplicaError::NotFound {
            kind: "Book",
            id: "B404".to_string(),
        }))
    );
    assert!(state.books.is_empty().await);
}

#[tokio::test]
async fn duplicate_user_create_overwrites() {
    let state = Arc::new(CatalogReplica::new());
    let handler = UserEventHandler::new(Arc::clone(&state));

    handler
        .handle(&user_event("created", "U1", "old@example.com"))
        .await
        .unwrap();
    handler
        .handle(&user_event("created", "U1", "new@example.com"))
        .await
        .unwrap();

    assert_eq!(state.users.len().await, 1);
    let stored = state.users.get("U1").await.unwrap();
    assert_eq!(stored.email, "new@example.com");
}

#[tokio::test]
async fn user_update_twice_is_idempotent() {
    let state = Arc::new(CatalogReplica::new());
    state.users.upsert(fixtures::user("U1")).await;
    let handler = UserEventHandler::new(Arc::clone(&state));

    let event = user_event("updated", "U1", "renamed@example.com");
    handler.handle(&event).await.unwrap();
    handler.handle(&event).await.unwrap();

    assert_eq!(state.users.len().await, 1);
    let stored = state.users.get("U1").await.unwrap();
    assert_eq!(stored.email, "renamed@example.com");
}

#[tokio::test]
async fn user_update_for_absent_id_mutates_nothing() {
    let state = Arc::new(CatalogReplica::new());
    let handler = UserEventHandler::new(Arc::clone(&state));

    let result = handler
        .handle(&user_event("updated", "U404", "ghost@example.com"))
        .await;

    assert_eq!(
        result,
        Err(HandlerError::Replica(ReplicaError::NotFound {
            kind: "User",
            id: "U404".to_string(),
        }))
    );
    assert!(state.users.is_empty().await);
}

#[tokio::test]
async fn user_delete_twice_is_a_silent_noop() {
    let state = Arc::new(CatalogReplica::new());
    state.users.upsert(fixtures::user("U9")).await;
    let handler = UserEventHandler::new(Arc::clone(&state));

    let event = user_event("deleted", "U9", "u9@example.com");
    handler.handle(&event).await.unwrap();
    handler.handle(&event).await.unwrap();

    assert!(state.users.is_empty().await);
}

#[tokio::test]
async fn borrow_event_with_missing_user_creates_no_record() {
    let state = Arc::new(CatalogReplica::new());
    state.books.upsert(fixtures::book("B1")).await;
    let handler = BorrowedBookCreatedHandler::new(Arc::clone(&state));

    let record = fixtures::borrowed_book("BB1", "U404", "B1");
    let event = body(json!({"borrowed_book": record, "action": "created"}));

    let result = handler.handle(&event).await;
    assert_eq!(
        result,
        Err(HandlerError::MissingReference {
            record: "BorrowedBook",
            kind: "User",
            id: "U404".to_string(),
        })
    );
    assert!(state.borrowed_books.is_empty().await);
}

#[tokio::test]
async fn borrow_event_with_missing_book_names_the_book_id() {
    let state = Arc::new(CatalogReplica::new());
    state.users.upsert(fixtures::user("U1")).await;
    let handler = BorrowedBookCreatedHandler::new(Arc::clone(&state));

    let record = fixtures::borrowed_book("BB1", "U1", "B404");
    let event = body(json!({"borrowed_book": record, "action": "created"}));

    let result = handler.handle(&event).await;
    assert_eq!(
        result,
        Err(HandlerError::MissingReference {
            record: "BorrowedBook",
            kind: "Book",
            id: "B404".to_string(),
        })
    );
    assert!(state.borrowed_books.is_empty().await);
}

#[tokio::test]
async fn borrow_event_with_resolved_references_creates_the_record() {
    let state = Arc::new(CatalogReplica::new());
    state.users.upsert(fixtures::user("U1")).await;
    state.books.upsert(fixtures::book("B1")).await;
    let handler = BorrowedBookCreatedHandler::new(Arc::clone(&state));

    let record = fixtures::borrowed_book("BB1", "U1", "B1");
    let event = body(json!({"borrowed_book": record, "action": "created"}));

    handler.handle(&event).await.unwrap();
    // Redelivery overwrites the same record.
    handler.handle(&event).await.unwrap();

    assert_eq!(state.borrowed_books.len().await, 1);
    let stored = state.borrowed_books.get("BB1").await.unwrap();
    assert_eq!(stored.user, "U1");
    assert_eq!(stored.book, "B1");
}

#[tokio::test]
async fn malformed_payloads_are_rejected_not_fatal() {
    let state = Arc::new(CatalogReplica::new());
    let users = UserEventHandler::new(Arc::clone(&state));
    let flips = BookAvailabilityHandler::new(Arc::clone(&state));

    for event in [
        b"not json at all".to_vec(),
        body(json!({"book": {"id": "B1"}, "action": "created"})),
        body(json!({"user": {"id": "U1"}})),
    ] {
        assert!(matches!(
            users.handle(&event).await,
            Err(HandlerError::Malformed(_))
        ));
        assert!(matches!(
            flips.handle(&event).await,
            Err(HandlerError::Malformed(_))
        ));
    }

    // An action-less user envelope parses but is still rejected.
    let missing_action = user_event("created", "U1", "u1@example.com");
    let mut missing_action: serde_json::Value =
        serde_json::from_slice(&missing_action).unwrap_or_default();
    if let Some(fields) = missing_action.as_object_mut() {
        fields.remove("action");
    }
    assert!(matches!(
        users.handle(&body(missing_action)).await,
        Err(HandlerError::Malformed(_))
    ));
}
