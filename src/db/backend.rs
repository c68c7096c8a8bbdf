//! Backend capability interface.
//!
//! A [`Backend`] knows how to open a [`Session`] against one kind of database
//! and how that database spells locking reads, auto-increment keys and dates.
//! The transaction coordinator in [`crate::db::provider`] is written once
//! against these traits; each database contributes one implementation.

use crate::db::statement;
use crate::error::{DalResult, DbFailure};
use crate::models::{Query, QueryParam, QueryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

pub const COMMIT: &str = "COMMIT";
pub const ROLLBACK: &str = "ROLLBACK";

/// One live, exclusively-owned database session.
///
/// Sessions are never shared: a session belongs to exactly one `run_query`
/// call or one transaction handle, and is closed exactly once.
#[async_trait]
pub trait Session: Send {
    /// Execute a parameterized statement and convert its outcome.
    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> Result<QueryResult, DbFailure>;

    /// Execute a transaction-control statement (begin, COMMIT, ROLLBACK).
    async fn execute_control(&mut self, sql: &str) -> Result<(), DbFailure>;

    /// Close the session, ending the database connection.
    async fn close(self: Box<Self>) -> Result<(), DbFailure>;
}

/// A database backend: connection provisioning plus dialect hooks.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Open a fresh session. No pooling, no retry.
    async fn connect(&self) -> Result<Box<dyn Session>, DbFailure>;

    /// Suggestion attached to connection errors.
    fn connection_suggestion(&self, failure: &DbFailure) -> String {
        statement::connection_suggestion(self.name(), failure)
    }

    /// Statement that opens a transaction. `lock` asks for a transaction that
    /// serializes against concurrent writers from the start.
    fn begin_statement(&self, lock: bool) -> &'static str;

    /// Rewrite a read so it takes row locks inside a transaction.
    fn for_update(&self, query: &Query) -> Query;

    /// Normalize a CREATE TABLE statement so integer primary keys auto-increment.
    fn auto_increment(&self, create_statement: &str) -> String;

    /// Column type used to store dates.
    fn date_type(&self) -> &'static str;

    /// Map the stored date representation (epoch seconds) to a UTC instant.
    fn convert_date_from_storage(&self, raw: i64) -> DalResult<DateTime<Utc>> {
        statement::epoch_to_utc(raw)
    }

    /// Map a UTC instant to its stored representation (epoch seconds).
    fn convert_date_for_storage(&self, date: &DateTime<Utc>) -> i64 {
        date.timestamp()
    }
}

/// Await a driver connect future, bounded by the configured connect timeout.
pub(crate) async fn connect_within<C, F>(limit: Option<Duration>, connecting: F) -> Result<C, DbFailure>
where
    F: Future<Output = Result<C, sqlx::Error>>,
{
    match limit {
        Some(limit) => match timeout(limit, connecting).await {
            Ok(result) => result.map_err(DbFailure::from),
            Err(_) => Err(DbFailure::new(format!(
                "Connection attempt timed out after {}s",
                limit.as_secs()
            ))),
        },
        None => connecting.await.map_err(DbFailure::from),
    }
}
