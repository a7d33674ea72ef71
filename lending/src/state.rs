//! Local state of the lending service.

use shelfsync_core::{Book, BorrowedBook, ReplicaStore, User};

/// The lending service's identifier-keyed tables.
///
/// `users` and `borrowed_books` are authoritative here; `books` is a replica
/// populated by `book.*` events from the catalog exchange. The lending side
/// also writes the replica's `is_available` flag when it processes a borrow
/// or a return, and re-publishes that flip back to the catalog.
#[derive(Debug, Default)]
pub struct LendingReplica {
    /// Book replicas, owned by the catalog service.
    pub books: ReplicaStore<Book>,
    /// Users, owned by this service.
    pub users: ReplicaStore<User>,
    /// Borrow records, owned by this service.
    pub borrowed_books: ReplicaStore<BorrowedBook>,
}

impl LendingReplica {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
