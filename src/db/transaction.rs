//! Explicit transaction handles.
//!
//! A [`TransactionHandle`] owns one session with an open transaction. Exactly
//! one of [`TransactionHandle::commit`] or [`TransactionHandle::rollback`]
//! resolves it; both release the session whatever the database answers, and
//! any later call fails with [`DalError::TransactionClosed`].

use crate::db::backend::{COMMIT, ROLLBACK, Session};
use crate::db::guard::ConnectionGuard;
use crate::error::{DalError, DalResult, DbFailure};
use crate::models::{Query, QueryResult, TransactionState};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// Issue COMMIT. If the server rejects it, try a ROLLBACK so the session is
/// not closed with the transaction still open, then report the commit failure.
pub(crate) async fn commit_session(
    session: &mut dyn Session,
    backend: &'static str,
) -> Result<(), DbFailure> {
    debug!(backend, "COMMIT");
    let failure = match session.execute_control(COMMIT).await {
        Ok(()) => return Ok(()),
        Err(failure) => failure,
    };

    if let Err(e) = session.execute_control(ROLLBACK).await {
        warn!(backend, error = %e, "Rollback after failed commit was rejected");
    }
    Err(failure)
}

pub struct TransactionHandle {
    id: String,
    guard: Option<ConnectionGuard>,
    state: TransactionState,
    lock: bool,
    backend: &'static str,
    started_at: DateTime<Utc>,
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("lock", &self.lock)
            .field("backend", &self.backend)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl TransactionHandle {
    /// Wrap a session on which the transaction has already been started.
    pub(crate) fn new(guard: ConnectionGuard, backend: &'static str, lock: bool) -> Self {
        let id = format!("tx_{}", uuid::Uuid::new_v4().simple());
        info!(transaction_id = %id, backend, lock, "Transaction started");
        Self {
            id,
            guard: Some(guard),
            state: TransactionState::Active,
            lock,
            backend,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether the transaction was opened with `lock = true`.
    pub fn is_locking(&self) -> bool {
        self.lock
    }

    /// Execute a statement inside the open transaction.
    ///
    /// Never begins, commits or releases anything. A failed statement leaves
    /// the transaction open; the caller decides whether to roll back.
    pub async fn run_query(&mut self, query: &Query) -> DalResult<QueryResult> {
        debug!(
            transaction_id = %self.id,
            sql = %query.text,
            params = query.values.len(),
            "Executing statement in transaction"
        );
        let session = self.active_session()?;
        session
            .execute(&query.text, &query.values)
            .await
            .map_err(|failure| DalError::query(failure, None))
    }

    /// Commit and release the session. The session is released even when the
    /// commit is rejected.
    pub async fn commit(&mut self) -> DalResult<()> {
        let mut guard = self.take_guard()?;
        let outcome = match guard.session() {
            Some(session) => commit_session(session, self.backend).await,
            None => Err(DbFailure::new("Session already released")),
        };
        guard.release().await;

        match outcome {
            Ok(()) => {
                self.state = TransactionState::Committed;
                info!(
                    transaction_id = %self.id,
                    duration_ms = self.elapsed_ms(),
                    "Transaction committed"
                );
                Ok(())
            }
            Err(failure) => {
                self.state = TransactionState::Failed;
                error!(transaction_id = %self.id, error = %failure, "Commit failed");
                Err(DalError::commit(failure))
            }
        }
    }

    /// Roll back and release the session. The session is released even when
    /// the rollback is rejected.
    pub async fn rollback(&mut self) -> DalResult<()> {
        let mut guard = self.take_guard()?;
        debug!(transaction_id = %self.id, "ROLLBACK");
        let outcome = match guard.session() {
            Some(session) => session.execute_control(ROLLBACK).await,
            None => Err(DbFailure::new("Session already released")),
        };
        guard.release().await;

        match outcome {
            Ok(()) => {
                self.state = TransactionState::RolledBack;
                info!(
                    transaction_id = %self.id,
                    duration_ms = self.elapsed_ms(),
                    "Transaction rolled back"
                );
                Ok(())
            }
            Err(failure) => {
                self.state = TransactionState::Failed;
                error!(transaction_id = %self.id, error = %failure, "Rollback failed");
                Err(DalError::rollback(failure))
            }
        }
    }

    fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    fn ensure_active(&self) -> DalResult<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(DalError::transaction_closed(&self.id, self.state))
        }
    }

    fn active_session(&mut self) -> DalResult<&mut (dyn Session + 'static)> {
        self.ensure_active()?;
        self.guard
            .as_mut()
            .and_then(|guard| guard.session())
            .ok_or_else(|| DalError::internal("Active transaction has no session"))
    }

    /// Move the session out of the handle so it can be resolved exactly once.
    fn take_guard(&mut self) -> DalResult<ConnectionGuard> {
        self.ensure_active()?;
        match self.guard.take() {
            Some(guard) => Ok(guard),
            None => {
                self.state = TransactionState::Failed;
                Err(DalError::transaction_closed(&self.id, self.state))
            }
        }
    }
}

impl Drop for TransactionHandle {
    fn drop(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let Some(mut guard) = self.guard.take() else {
            return;
        };

        error!(
            transaction_id = %self.id,
            backend = self.backend,
            "Transaction dropped without commit or rollback - rolling back"
        );
        self.state = TransactionState::RolledBack;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transaction_id = std::mem::take(&mut self.id);
                handle.spawn(async move {
                    if let Some(session) = guard.session() {
                        if let Err(e) = session.execute_control(ROLLBACK).await {
                            warn!(transaction_id = %transaction_id, error = %e, "Rollback of dropped transaction failed");
                        }
                    }
                    guard.release().await;
                });
            }
            // Closing the connection discards the open transaction server-side
            Err(_) => drop(guard),
        }
    }
}
