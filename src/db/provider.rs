//! Transaction coordinator.
//!
//! [`Provider`] is the entry point used by repository code. It holds a backend
//! and nothing else: every call opens its own session, runs strictly
//! sequentially on it, and closes it before returning.

use crate::config::ProviderConfig;
use crate::db::backend::{Backend, ROLLBACK};
use crate::db::guard::ConnectionGuard;
use crate::db::mysql::MySqlBackend;
use crate::db::sqlite::SqliteBackend;
use crate::db::transaction::{TransactionHandle, commit_session};
use crate::error::{DalError, DalResult};
use crate::models::{ProviderKind, Query, QueryResult};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Clone)]
pub struct Provider {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Provider {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Build the backend matching the configured provider. Does not connect.
    pub fn from_config(config: &ProviderConfig) -> DalResult<Self> {
        let backend: Arc<dyn Backend> = match config.kind {
            ProviderKind::MySql => Arc::new(MySqlBackend::new(config)?),
            ProviderKind::Sqlite => Arc::new(SqliteBackend::new(config)?),
        };
        debug!(
            backend = backend.name(),
            url = %config.masked_connection_string(),
            "Provider configured"
        );
        Ok(Self::new(backend))
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run one statement in its own transaction.
    ///
    /// The statement is committed on success. On failure it is rolled back and
    /// the statement's error is returned as [`DalError::Query`]. The session is
    /// closed exactly once on every path.
    pub async fn run_query(&self, query: &Query) -> DalResult<QueryResult> {
        trace!(
            backend = self.name(),
            sql = %query.text,
            params = query.values.len(),
            "run_query"
        );
        let mut guard = self.acquire().await?;
        let outcome = self.execute_atomically(&mut guard, query).await;
        guard.release().await;
        outcome
    }

    async fn execute_atomically(
        &self,
        guard: &mut ConnectionGuard,
        query: &Query,
    ) -> DalResult<QueryResult> {
        let backend = self.name();
        let session = guard
            .session()
            .ok_or_else(|| DalError::internal("Session released before use"))?;

        let begin = self.backend.begin_statement(false);
        debug!(backend, statement = begin, "Starting transaction");
        session
            .execute_control(begin)
            .await
            .map_err(DalError::transaction_start)?;

        match session.execute(&query.text, &query.values).await {
            Ok(result) => {
                commit_session(session, backend)
                    .await
                    .map_err(DalError::commit)?;
                Ok(result)
            }
            Err(failure) => {
                debug!(backend, error = %failure, "Statement failed, rolling back");
                let rollback_error = session.execute_control(ROLLBACK).await.err();
                if let Some(e) = &rollback_error {
                    warn!(backend, error = %e, "Rollback after failed statement was rejected");
                }
                Err(DalError::query(failure, rollback_error))
            }
        }
    }

    /// Open a transaction and hand it to the caller.
    ///
    /// The caller must resolve the handle with `commit` or `rollback`. A handle
    /// dropped while still active rolls back in the background and logs an
    /// error; prefer [`Provider::transaction`] where the work fits in a closure.
    ///
    /// With `lock = true` the transaction is opened so that locking reads
    /// (see [`Provider::for_update`]) serialize concurrent writers.
    pub async fn begin_transaction(&self, lock: bool) -> DalResult<TransactionHandle> {
        trace!(backend = self.name(), lock, "begin_transaction");
        let mut guard = self.acquire().await?;

        let begin = self.backend.begin_statement(lock);
        debug!(backend = self.name(), statement = begin, "Starting transaction");
        let started = match guard.session() {
            Some(session) => session.execute_control(begin).await,
            None => return Err(DalError::internal("Session released before use")),
        };

        match started {
            Ok(()) => Ok(TransactionHandle::new(guard, self.name(), lock)),
            Err(failure) => {
                guard.release().await;
                Err(DalError::transaction_start(failure))
            }
        }
    }

    /// Run `work` inside a transaction that is always resolved.
    ///
    /// Commits when `work` returns `Ok` and rolls back when it returns `Err`.
    /// The work's own error wins over a rollback error. If `work` resolved the
    /// handle itself, the value or error is passed through untouched.
    ///
    /// The future may only borrow the handle, so build queries outside and move
    /// them in:
    ///
    /// ```ignore
    /// let read = provider.for_update(
    ///     &Query::new("SELECT id, new_count FROM mailbox WHERE number = ?").bind("1234"),
    /// );
    /// let mailbox = provider
    ///     .transaction(true, move |tx| Box::pin(async move {
    ///         let row = tx.run_query(&read).await?;
    ///         tx.run_query(
    ///             &Query::new("UPDATE mailbox SET new_count = new_count + 1 WHERE number = ?")
    ///                 .bind("1234"),
    ///         )
    ///         .await?;
    ///         Ok(row.first().cloned())
    ///     }))
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&self, lock: bool, work: F) -> DalResult<T>
    where
        F: for<'t> FnOnce(&'t mut TransactionHandle) -> BoxFuture<'t, DalResult<T>>,
    {
        let mut tx = self.begin_transaction(lock).await?;

        match work(&mut tx).await {
            Ok(value) => {
                if tx.state().is_active() {
                    tx.commit().await?;
                }
                Ok(value)
            }
            Err(e) => {
                if tx.state().is_active() {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(
                            transaction_id = %tx.id(),
                            error = %rollback_err,
                            "Rollback after failed transaction work was rejected"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Copy of `query` that takes row locks when run inside a transaction.
    pub fn for_update(&self, query: &Query) -> Query {
        trace!(backend = self.name(), "for_update");
        self.backend.for_update(query)
    }

    pub fn auto_increment(&self, create_statement: &str) -> String {
        trace!(backend = self.name(), "auto_increment");
        self.backend.auto_increment(create_statement)
    }

    pub fn convert_date_from_storage(&self, raw: i64) -> DalResult<DateTime<Utc>> {
        trace!(backend = self.name(), raw, "convert_date_from_storage");
        self.backend.convert_date_from_storage(raw)
    }

    pub fn convert_date_for_storage(&self, date: &DateTime<Utc>) -> i64 {
        trace!(backend = self.name(), %date, "convert_date_for_storage");
        self.backend.convert_date_for_storage(date)
    }

    /// Column type used for date columns in schema creation.
    pub fn date_type(&self) -> &'static str {
        self.backend.date_type()
    }

    async fn acquire(&self) -> DalResult<ConnectionGuard> {
        match self.backend.connect().await {
            Ok(session) => {
                trace!(backend = self.name(), "Session opened");
                Ok(ConnectionGuard::new(session, self.name()))
            }
            Err(failure) => {
                let suggestion = self.backend.connection_suggestion(&failure);
                warn!(backend = self.name(), error = %failure, "Failed to open session");
                Err(DalError::connection(failure.message, suggestion))
            }
        }
    }
}
