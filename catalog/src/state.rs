//! Local state of the catalog service.

use shelfsync_core::{Book, BorrowedBook, ReplicaStore, User};

/// The catalog's identifier-keyed tables.
///
/// `books` is the authoritative table the catalog's own CRUD layer writes;
/// `users` and `borrowed_books` are replicas populated exclusively by events
/// from the lending exchange. One `Arc<CatalogReplica>` is shared between the
/// consumer loop's handlers and the rest of the process.
#[derive(Debug, Default)]
pub struct CatalogReplica {
    /// Books, owned by this service.
    pub books: ReplicaStore<Book>,
    /// User replicas, owned by the lending service.
    pub users: ReplicaStore<User>,
    /// Borrow-record replicas, owned by the lending service.
    pub borrowed_books: ReplicaStore<BorrowedBook>,
}

impl CatalogReplica {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
