//! Storage for the storefront core.
//!
//! The checkout and order services only see the traits in [`store`]. Two
//! backends implement them:
//! - [`InMemoryStore`], used by tests and the database-less deployment
//! - [`PostgresStore`], backed by sqlx
//!
//! Both give a [`Transaction`] the same guarantees: product and order rows
//! are locked for the lifetime of the transaction, and nothing written
//! through it is visible to other readers until commit.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemorySessionStore, InMemoryStore};
pub use postgres::{PostgresSessionStore, PostgresStore};
pub use store::{Catalog, SessionStore, Store, Transaction};
