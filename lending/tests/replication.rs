//! End-to-end handler behavior against the lending service's in-memory state.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use shelfsync_broker::{EventHandler, HandlerError};
use shelfsync_core::store::ReplicaError;
use shelfsync_lending::handlers::BookEventHandler;
use shelfsync_lending::LendingReplica;
use shelfsync_testing::fixtures;
use std::sync::Arc;

fn book_event(action: &str, id: &str, title: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "book": {
            "id": id,
            "title": title,
            "author": "Frank Herbert",
            "published_date": "1965-08-01",
            "publisher": "Chilton",
            "category": "sci-fi",
            "is_available": true,
        },
        "action": action,
        "timestamp": "2024-01-01T00:00:00Z",
    }))
    .unwrap_or_default()
}

#[tokio::test]
async fn duplicate_book_create_overwrites() {
    let state = Arc::new(LendingReplica::new());
    let handler = BookEventHandler::new(Arc::clone(&state));

    handler.handle(&book_event("created", "B1", "Dune")).await.unwrap();
    handler
        .handle(&book_event("created", "B1", "Dune Messiah"))
        .await
        .unwrap();

    assert_eq!(state.books.len().await, 1);
    let stored = state.books.get("B1").await.unwrap();
    assert_eq!(stored.title, "Dune Messiah");
}

#[tokio::test]
async fn book_update_for_absent_id_mutates_nothing() {
    let state = Arc::new(LendingReplica::new());
    let handler = BookEventHandler::new(Arc::clone(&state));

    let result = handler.handle(&book_event("updated", "B404", "Ghost")).await;

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
async fn book_update_twice_is_idempotent() {
    let state = Arc::new(LendingReplica::new());
    state.books.upsert(fixtures::book("B1")).await;
    let handler = BookEventHandler::new(Arc::clone(&state));

    let event = book_event("updated", "B1", "Dune (revised)");
    handler.handle(&event).await.unwrap();
    handler.handle(&event).await.unwrap();

    assert_eq!(state.books.len().await, 1);
    let stored = state.books.get("B1").await.unwrap();
    assert_eq!(stored.title, "Dune (revised)");
}

#[tokio::test]
async fn book_delete_twice_is_a_silent_noop() {
    let state = Arc::new(LendingReplica::new());
    state.books.upsert(fixtures::book("B1")).await;
    let handler = BookEventHandler::new(Arc::clone(&state));

    let event = book_event("deleted", "B1", "Dune");
    handler.handle(&event).await.unwrap();
    handler.handle(&event).await.unwrap();

    assert!(state.books.is_empty().await);
}

#[tokio::test]
async fn malformed_book_payloads_are_rejected_not_fatal() {
    let state = Arc::new(LendingReplica::new());
    let handler = BookEventHandler::new(Arc::clone(&state));

    for event in [
        b"{broken".to_vec(),
        serde_json::to_vec(&json!({"user": {"id": "U1"}, "action": "created"}))
            .unwrap_or_default(),
        serde_json::to_vec(&json!({"book": {"id": "B1"}, "action": "created"}))
            .unwrap_or_default(),
    ] {
        assert!(matches!(
            handler.handle(&event).await,
            Err(HandlerError::Malformed(_))
        ));
    }

    assert!(state.books.is_empty().await);
}
