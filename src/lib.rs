//! Voicemail data-access layer.
//!
//! Runs parameterized statements against MySQL or SQLite with an
//! all-or-nothing contract: every statement passed to
//! [`Provider::run_query`] runs in its own transaction, and
//! [`Provider::begin_transaction`] / [`Provider::transaction`] group several
//! statements into one. Each call owns a fresh connection and closes it
//! before returning.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, ProviderConfig};
pub use db::{Provider, TransactionHandle};
pub use error::{DalError, DalResult};
pub use models::{Query, QueryParam, QueryResult};
