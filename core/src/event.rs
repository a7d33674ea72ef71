//! Event envelopes and exchange topology.
//!
//! Both services speak the same wire format: a UTF-8 JSON object with the
//! entity payload nested under its kind key, an `action` discriminator, and a
//! publish timestamp stamped by the broker client just before the send:
//!
//! ```json
//! {"user": {"id": "U9", "...": "..."}, "action": "deleted", "timestamp": "2024-01-01T00:00:00Z"}
//! ```
//!
//! The availability-flip event is the one exception: it omits `action` and
//! nests only the partial book fields needed for the update.
//!
//! Envelopes are transient: built per mutation, published and discarded.
//! The messaging layer never persists them.

use crate::entity::Replicated;
use serde::de::{self, DeserializeOwned};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Exchange names, one topic exchange per owning service.
pub mod exchanges {
    /// Exchange the catalog service publishes on (book events).
    pub const CATALOG: &str = "catalog";
    /// Exchange the lending service publishes on (user, borrow and
    /// availability events).
    pub const LENDING: &str = "lending";
}

/// Routing keys, following the `<entity>.<action>` pattern.
pub mod routing {
    /// A book was created (catalog exchange).
    pub const BOOK_CREATED: &str = "book.created";
    /// A book was updated (catalog exchange) or its availability flipped
    /// (lending exchange).
    pub const BOOK_UPDATED: &str = "book.updated";
    /// A book was deleted (catalog exchange).
    pub const BOOK_DELETED: &str = "book.deleted";
    /// A user was created (lending exchange).
    pub const USER_CREATED: &str = "user.created";
    /// A user was updated (lending exchange).
    pub const USER_UPDATED: &str = "user.updated";
    /// A user was deleted (lending exchange).
    pub const USER_DELETED: &str = "user.deleted";
    /// A borrow record was created (lending exchange).
    pub const BORROWED_BOOK_CREATED: &str = "borrowed_book.created";
}

/// The mutation a replication event describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The entity was created by its owning service.
    Created,
    /// The entity was updated by its owning service.
    Updated,
    /// The entity was deleted by its owning service.
    Deleted,
}

impl Action {
    /// Lowercase wire spelling, also used to build routing keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A replication event envelope.
///
/// The payload is nested under [`Replicated::KIND`], so the same envelope
/// type serializes to `{"book": …}`, `{"user": …}` or `{"borrowed_book": …}`
/// depending on `T`. `action` is absent for the availability-flip event;
/// `timestamp` is absent until the publisher stamps it.
///
/// Unknown top-level fields are ignored on deserialization so that envelope
/// evolution on the publishing side never kills a consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct EventEnvelope<T> {
    /// The nested entity payload.
    pub payload: T,
    /// The action discriminator, if the event carries one.
    pub action: Option<Action>,
    /// Publish timestamp, stamped by the broker client before the send.
    /// Kept as an opaque string: it is diagnostic metadata, never an input
    /// to a handler.
    pub timestamp: Option<String>,
}

impl<T> EventEnvelope<T> {
    /// Envelope with an action discriminator.
    pub const fn new(payload: T, action: Action) -> Self {
        Self {
            payload,
            action: Some(action),
            timestamp: None,
        }
    }

    /// Envelope without an action, as used by the availability-flip event.
    pub const fn bare(payload: T) -> Self {
        Self {
            payload,
            action: None,
            timestamp: None,
        }
    }
}

impl<T: Replicated + Serialize> Serialize for EventEnvelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len =
            1 + usize::from(self.action.is_some()) + usize::from(self.timestamp.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(T::KIND, &self.payload)?;
        if let Some(action) = self.action {
            map.serialize_entry("action", &action)?;
        }
        if let Some(timestamp) = &self.timestamp {
            map.serialize_entry("timestamp", timestamp)?;
        }
        map.end()
    }
}

impl<'de, T: Replicated + DeserializeOwned> Deserialize<'de> for EventEnvelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = serde_json::Map::deserialize(deserializer)?;

        let payload = fields
            .remove(T::KIND)
            .ok_or_else(|| de::Error::missing_field(T::KIND))?;
        let payload: T = serde_json::from_value(payload).map_err(de::Error::custom)?;

        let action = match fields.remove("action") {
            Some(value) => Some(serde_json::from_value(value).map_err(de::Error::custom)?),
            None => None,
        };

        let timestamp = fields
            .remove("timestamp")
            .and_then(|value| value.as_str().map(String::from));

        Ok(Self {
            payload,
            action,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BookAvailability, User};

    fn sample_user() -> User {
        User {
            id: "U9".to_string(),
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            is_active: Some(true),
            last_login: None,
        }
    }

    #[test]
    fn envelope_nests_payload_under_entity_kind() {
        let envelope = EventEnvelope::new(sample_user(), Action::Deleted);
        let value = serde_json::to_value(&envelope).unwrap_or_default();

        assert_eq!(value["user"]["id"], "U9");
        assert_eq!(value["action"], "deleted");
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn availability_flip_envelope_omits_action() {
        let envelope = EventEnvelope::bare(BookAvailability {
            id: "B1".to_string(),
            is_available: false,
        });
        let value = serde_json::to_value(&envelope).unwrap_or_default();

        assert_eq!(value["book"]["id"], "B1");
        assert_eq!(value["book"]["is_available"], false);
        assert!(value.get("action").is_none());
    }

    #[test]
    fn envelope_deserializes_and_ignores_unknown_fields() {
        let envelope: EventEnvelope<User> = serde_json::from_value(serde_json::json!({
            "user": {
                "id": "U9",
                "email": "ada@example.com",
                "first_name": "Ada",
                "last_name": "Lovelace",
            },
            "action": "updated",
            "timestamp": "2024-01-01T00:00:00Z",
            "trace_id": "ignored",
        }))
        .unwrap_or_else(|e| panic!("envelope should parse: {e}"));

        assert_eq!(envelope.payload.id, "U9");
        assert_eq!(envelope.action, Some(Action::Updated));
        assert_eq!(envelope.timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn envelope_without_expected_payload_key_is_rejected() {
        let result: Result<EventEnvelope<User>, _> = serde_json::from_value(serde_json::json!({
            "book": {"id": "B1"},
            "action": "created",
        }));

        assert!(result.is_err());
    }
}
