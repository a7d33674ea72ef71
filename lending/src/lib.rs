//! Lending service replication layer.
//!
//! The lending service is authoritative for users and borrow records. This
//! crate contains the pieces of the lending service that participate in
//! replication:
//!
//! - [`state::LendingReplica`]: the lending service's book replica (owned by
//!   the catalog) plus its own user and borrow tables;
//! - [`handlers`]: inbound handlers applied to deliveries from the catalog
//!   exchange;
//! - [`dispatch::inbound_dispatch_table`]: the routing-key table the
//!   consumer loop runs;
//! - [`events`]: outbound publishing on the lending exchange: user events,
//!   borrow creation and the book availability flip.

pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod state;

pub use dispatch::inbound_dispatch_table;
pub use state::LendingReplica;
