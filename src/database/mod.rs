//! # Persistence Collaborator
//!
//! The transfer engine talks to storage only through the traits in [`store`]:
//!
//! - [`TransferItemStore`] - point lookups, bulk "in-list" filters and per-row updates
//!   of transfer items
//! - [`MembershipStore`] - the membership oracle, backed by a uniqueness-constrained
//!   association table
//! - [`StoreProvider`] - hands out an explicitly scoped [`StoreSession`] per job or
//!   batch invocation; the session releases its connection when dropped, on every
//!   exit path
//!
//! Two providers ship with the crate: [`PgStoreProvider`] over a SQLx pool and
//! [`InMemoryStore`] for tests and local development.

pub mod connection;
pub mod error_codes;
pub mod in_memory;
pub mod postgres;
pub mod store;

pub use connection::{create_pool, health_check};
pub use error_codes::PgErrorCode;
pub use in_memory::InMemoryStore;
pub use postgres::{PgStoreProvider, PgStoreSession};
pub use store::{
    MembershipStore, StoreError, StoreProvider, StoreResult, StoreSession, TransferItemStore,
};
