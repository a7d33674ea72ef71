//! Identifier-keyed replica stores.
//!
//! A [`ReplicaStore`] stands in for the local data store that the (out of
//! scope) CRUD layer owns. Handlers mutate it strictly by identifier lookup:
//! a `create` for an already-present id overwrites, an `update` for an absent
//! id is a structured not-found error, and a `delete` for an absent id
//! silently succeeds. Those three rules are what makes replaying the same
//! event idempotent.
//!
//! The store is `Arc`-shared between the consumer loop's handlers and
//! whatever in-process code plays the part of the request-serving side. The
//! consumer loop processes one message at a time, so there is no concurrent
//! handler execution; the `RwLock` only guards against readers on the other
//! side of that share.

use crate::entity::Replicated;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Error applying a mutation to a replica.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicaError {
    /// Lookup by identifier found nothing. The message names the entity kind
    /// and id so the consumer-side log is actionable on its own.
    #[error("{kind} with ID {id} doesn't exist")]
    NotFound {
        /// Entity kind (`"Book"`, `"User"`, …).
        kind: &'static str,
        /// The identifier that missed.
        id: String,
    },
}

impl ReplicaError {
    /// Not-found error for entity type `T` and the given id.
    pub fn not_found<T: Replicated>(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: T::NAME,
            id: id.into(),
        }
    }
}

/// In-memory, identifier-keyed replica of one entity type.
#[derive(Debug)]
pub struct ReplicaStore<T> {
    entries: RwLock<HashMap<String, T>>,
}

// Manual impl: a derive would require `T: Default`, but entities have no
// meaningful default and an empty store needs none.
impl<T> Default for ReplicaStore<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Replicated> ReplicaStore<T> {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite by the entity's own identifier.
    ///
    /// This is the canonical `created` behavior: a duplicate create on an
    /// existing id overwrites the fields present in the payload instead of
    /// failing, which keeps create idempotent under redelivery.
    pub async fn upsert(&self, entity: T) {
        let mut entries = self.entries.write().await;
        entries.insert(entity.id().to_string(), entity);
    }

    /// Replace an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicaError::NotFound`] when no entity with that id exists;
    /// the caller logs it and stops. No retry, no implicit creation.
    pub async fn update(&self, entity: T) -> Result<(), ReplicaError> {
        let mut entries = self.entries.write().await;
        let id = entity.id().to_string();
        if !entries.contains_key(&id) {
            return Err(ReplicaError::not_found::<T>(id));
        }
        entries.insert(id, entity);
        Ok(())
    }

    /// Mutate an existing entity in place and return the updated copy.
    ///
    /// Used by partial-payload events (the availability flip) that touch a
    /// single field rather than replacing the record.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicaError::NotFound`] when no entity with that id exists.
    pub async fn update_with(
        &self,
        id: &str,
        apply: impl FnOnce(&mut T),
    ) -> Result<T, ReplicaError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entity) => {
                apply(entity);
                Ok(entity.clone())
            }
            None => Err(ReplicaError::not_found::<T>(id)),
        }
    }

    /// Remove by identifier. Removing an absent id is a silent success;
    /// delete is naturally idempotent.
    pub async fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(id).is_some()
    }

    /// Fetch a copy by identifier.
    pub async fn get(&self, id: &str) -> Option<T> {
        let entries = self.entries.read().await;
        entries.get(id).cloned()
    }

    /// Whether an entity with this identifier exists.
    pub async fn contains(&self, id: &str) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(id)
    }

    /// Number of replicated entities.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    /// Whether the replica is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::User;

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            is_active: Some(true),
            last_login: None,
        }
    }

    #[tokio::test]
    async fn default_store_is_empty_even_for_entities_without_defaults() {
        // BorrowedBook itself has no Default impl; the store must not need one.
        let store: ReplicaStore<crate::entity::BorrowedBook> = ReplicaStore::default();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_id() {
        let store = ReplicaStore::new();
        store.upsert(user("U1", "old@example.com")).await;
        store.upsert(user("U1", "new@example.com")).await;

        assert_eq!(store.len().await, 1);
        let stored = store.get("U1").await;
        assert_eq!(stored.map(|u| u.email).as_deref(), Some("new@example.com"));
    }

    #[tokio::test]
    async fn update_missing_id_reports_not_found_and_mutates_nothing() {
        let store: ReplicaStore<User> = ReplicaStore::new();
        let result = store.update(user("U404", "ghost@example.com")).await;

        assert_eq!(
            result,
            Err(ReplicaError::NotFound {
                kind: "User",
                id: "U404".to_string()
            })
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn not_found_message_names_kind_and_id() {
        let err = ReplicaError::not_found::<User>("U404");
        assert_eq!(err.to_string(), "User with ID U404 doesn't exist");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = ReplicaStore::new();
        store.upsert(user("U1", "ada@example.com")).await;

        assert!(store.remove("U1").await);
        assert!(!store.remove("U1").await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn update_with_applies_partial_mutation() {
        let store = ReplicaStore::new();
        store.upsert(user("U1", "ada@example.com")).await;

        let updated = store
            .update_with("U1", |u| u.is_active = Some(false))
            .await;
        assert_eq!(updated.map(|u| u.is_active), Ok(Some(false)));
    }
}
