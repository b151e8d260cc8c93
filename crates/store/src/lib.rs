//! Transactional persistence for the order-fulfillment system.
//!
//! The [`Store`] trait covers plain reads and inserts; [`Transaction`]
//! carries the row-locked reads and writes that must commit together.
//! Two backends are provided: [`InMemoryStore`] and [`PostgresStore`].

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{PRODUCTS_NAME_KEY, Result, StoreError, USERS_EMAIL_KEY};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use query::OrderQuery;
pub use store::{Store, Transaction};
