//! Catalog service replication layer.
//!
//! The catalog service is authoritative for books. This crate contains the
//! pieces of the catalog that participate in replication:
//!
//! - [`state::CatalogReplica`]: the catalog's local replicas of users and
//!   borrow records (owned by the lending service), plus its own book table;
//! - [`handlers`]: inbound handlers applied to deliveries from the lending
//!   exchange;
//! - [`dispatch::inbound_dispatch_table`]: the routing-key table the
//!   consumer loop runs;
//! - [`events`]: outbound `book.*` publishing on the catalog exchange.

pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod state;

pub use dispatch::inbound_dispatch_table;
pub use state::CatalogReplica;
