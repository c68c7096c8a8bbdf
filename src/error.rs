//! Error types for the voicemail DAL.
//!
//! Backend failures are captured as [`DbFailure`] at the driver boundary and
//! classified into a [`DalError`] by the transaction coordinator, according to
//! the phase (connect, begin, statement, commit, rollback) they happened in.

use crate::config::ConfigError;
use crate::models::TransactionState;
use thiserror::Error;

/// A failure reported by the database client, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DbFailure {
    pub message: String,
    /// e.g., "23000" for an integrity constraint violation on MySQL
    pub sql_state: Option<String>,
}

impl DbFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

impl From<sqlx::Error> for DbFailure {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => Self {
                message: db_err.message().to_string(),
                sql_state: db_err.code().map(|c| c.to_string()),
            },
            sqlx::Error::Io(io_err) => Self::new(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => Self::new(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => Self::new(format!("Protocol error: {}", msg)),
            sqlx::Error::Configuration(msg) => {
                Self::new(format!("Configuration error: {}", msg))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Failed to decode column {}: {}", index, source))
            }
            other => Self::new(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum DalError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Failed to start transaction: {message}")]
    TransactionStart {
        message: String,
        sql_state: Option<String>,
    },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        sql_state: Option<String>,
        /// Set when the automatic rollback after the failure was rejected too.
        rollback_error: Option<String>,
    },

    #[error("Commit failed: {message}")]
    Commit {
        message: String,
        sql_state: Option<String>,
    },

    #[error("Rollback failed: {message}")]
    Rollback {
        message: String,
        sql_state: Option<String>,
    },

    #[error("Transaction {transaction_id} is no longer active ({state})")]
    TransactionClosed {
        transaction_id: String,
        state: TransactionState,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DalError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn transaction_start(failure: DbFailure) -> Self {
        Self::TransactionStart {
            message: failure.message,
            sql_state: failure.sql_state,
        }
    }

    /// Wrap a statement failure, keeping any rollback failure as secondary context.
    pub fn query(failure: DbFailure, rollback_error: Option<DbFailure>) -> Self {
        Self::Query {
            message: failure.message,
            sql_state: failure.sql_state,
            rollback_error: rollback_error.map(|e| e.message),
        }
    }

    pub fn commit(failure: DbFailure) -> Self {
        Self::Commit {
            message: failure.message,
            sql_state: failure.sql_state,
        }
    }

    pub fn rollback(failure: DbFailure) -> Self {
        Self::Rollback {
            message: failure.message,
            sql_state: failure.sql_state,
        }
    }

    pub fn transaction_closed(transaction_id: impl Into<String>, state: TransactionState) -> Self {
        Self::TransactionClosed {
            transaction_id: transaction_id.into(),
            state,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// SQLSTATE reported by the database, if the failure came from a statement.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::TransactionStart { sql_state, .. }
            | Self::Query { sql_state, .. }
            | Self::Commit { sql_state, .. }
            | Self::Rollback { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Check if this error is worth retrying by the caller.
    ///
    /// The DAL itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Result type alias for DAL operations.
pub type DalResult<T> = Result<T, DalError>;
