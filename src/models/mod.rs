//! Data models for the voicemail DAL.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ProviderKind, TransactionState};
pub use query::{ColumnMetadata, Query, QueryParam, QueryResult};
