//! Database access layer.
//!
//! - [`backend`]: the capability traits every database implements
//! - [`mysql`] / [`sqlite`]: the concrete backends
//! - [`provider`]: the transaction coordinator built on those traits
//! - [`transaction`]: explicit transaction handles
//! - [`guard`]: scoped session release
//! - [`params`] / [`types`]: parameter binding and row decoding
//! - [`statement`]: dialect helpers

pub mod backend;
pub mod guard;
pub mod mysql;
pub mod params;
pub mod provider;
pub mod sqlite;
pub mod statement;
pub mod transaction;
pub mod types;

pub use backend::{Backend, Session};
pub use guard::ConnectionGuard;
pub use mysql::MySqlBackend;
pub use provider::Provider;
pub use sqlite::SqliteBackend;
pub use transaction::TransactionHandle;
