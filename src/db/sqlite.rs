//! SQLite backend.

use crate::config::ProviderConfig;
use crate::db::backend::{Backend, Session, connect_within};
use crate::db::params::sqlite_query;
use crate::db::types::rows_to_json;
use crate::error::{DalError, DalResult, DbFailure};
use crate::models::{Query, QueryParam, QueryResult};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Connection, Either, Executor, SqliteConnection};
use std::str::FromStr;
use std::time::Duration;

pub struct SqliteBackend {
    options: SqliteConnectOptions,
    connect_timeout: Option<Duration>,
}

impl SqliteBackend {
    pub fn new(config: &ProviderConfig) -> DalResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.connection_string)
            .map_err(|e| {
                DalError::connection(
                    format!("Invalid SQLite connection string: {}", e),
                    "Check the connection URL format: sqlite:voicemail.db",
                )
            })?
            .create_if_missing(config.create_if_missing);

        Ok(Self {
            options,
            connect_timeout: config.connect_timeout,
        })
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> Result<Box<dyn Session>, DbFailure> {
        let conn =
            connect_within(self.connect_timeout, SqliteConnection::connect_with(&self.options))
                .await?;
        Ok(Box::new(SqliteSession { conn }))
    }

    /// `BEGIN IMMEDIATE` takes the database write lock up front, so two locking
    /// transactions serialize at begin instead of failing at their first write.
    fn begin_statement(&self, lock: bool) -> &'static str {
        if lock { "BEGIN IMMEDIATE" } else { "BEGIN" }
    }

    // SQLite has no row locks; the write lock covers the whole database.
    fn for_update(&self, query: &Query) -> Query {
        query.clone()
    }

    fn auto_increment(&self, create_statement: &str) -> String {
        create_statement.to_string()
    }

    fn date_type(&self) -> &'static str {
        "INTEGER"
    }
}

struct SqliteSession {
    conn: SqliteConnection,
}

/// Connection-wide counters. SQLite reports both per connection, not per
/// statement, so a statement's own effect is the difference across it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counters {
    total_changes: i64,
    last_insert_rowid: i64,
}

impl SqliteSession {
    async fn counters(&mut self) -> Result<Counters, DbFailure> {
        let (total_changes, last_insert_rowid) =
            sqlx::query_as::<_, (i64, i64)>("SELECT total_changes(), last_insert_rowid()")
                .fetch_one(&mut self.conn)
                .await?;
        Ok(Counters {
            total_changes,
            last_insert_rowid,
        })
    }
}

#[async_trait]
impl Session for SqliteSession {
    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> Result<QueryResult, DbFailure> {
        let before = self.counters().await?;

        let mut stream = if params.is_empty() {
            (&mut self.conn).fetch_many(sql)
        } else {
            (&mut self.conn).fetch_many(sqlite_query(sql, params))
        };
        let mut rows: Vec<SqliteRow> = Vec::new();
        let mut reported = 0;
        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => reported += done.rows_affected(),
                Either::Right(row) => rows.push(row),
            }
        }
        drop(stream);

        let after = self.counters().await?;
        let wrote = after.total_changes != before.total_changes;
        let rows_affected = if wrote { reported } else { 0 };
        let insert_id = (wrote && after.last_insert_rowid != before.last_insert_rowid)
            .then_some(after.last_insert_rowid);

        let (columns, rows) = rows_to_json(&rows);
        Ok(QueryResult {
            columns,
            rows,
            rows_affected,
            insert_id,
        })
    }

    async fn execute_control(&mut self, sql: &str) -> Result<(), DbFailure> {
        (&mut self.conn).execute(sql).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DbFailure> {
        self.conn.close().await.map_err(DbFailure::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        let config = ProviderConfig::parse("sqlite:voicemail.db").unwrap();
        SqliteBackend::new(&config).unwrap()
    }

    #[test]
    fn test_begin_statement() {
        let backend = backend();
        assert_eq!(backend.begin_statement(false), "BEGIN");
        assert_eq!(backend.begin_statement(true), "BEGIN IMMEDIATE");
    }

    #[test]
    fn test_for_update_is_a_copy() {
        let query = Query::new("SELECT * FROM mailbox WHERE id = ?").bind(7);
        let copy = backend().for_update(&query);
        assert_eq!(copy, query);
    }

    #[test]
    fn test_dialect_passthroughs() {
        let backend = backend();
        let create = "CREATE TABLE folder (id INTEGER PRIMARY KEY, name TEXT)";
        assert_eq!(backend.auto_increment(create), create);
        assert_eq!(backend.date_type(), "INTEGER");
    }

    #[tokio::test]
    async fn test_session_roundtrip_in_memory() {
        let config = ProviderConfig::parse("sqlite::memory:").unwrap();
        let backend = SqliteBackend::new(&config).unwrap();
        let mut session = backend.connect().await.unwrap();

        session
            .execute("CREATE TABLE folder (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await
            .unwrap();
        let inserted = session
            .execute("INSERT INTO folder (name) VALUES (?)", &[QueryParam::from("INBOX")])
            .await
            .unwrap();
        assert_eq!(inserted.rows_affected, 1);
        assert_eq!(inserted.insert_id, Some(1));

        let selected = session
            .execute("SELECT id, name FROM folder", &[])
            .await
            .unwrap();
        assert_eq!(selected.row_count(), 1);
        assert_eq!(selected.rows[0]["name"], serde_json::json!("INBOX"));
        assert_eq!(selected.rows_affected, 0);
        assert_eq!(selected.insert_id, None);

        let created = session
            .execute("CREATE TABLE greeting (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();
        assert_eq!(created.rows_affected, 0);
        assert_eq!(created.insert_id, None);

        let renamed = session
            .execute("UPDATE folder SET name = ? WHERE id = 1", &[QueryParam::from("Old")])
            .await
            .unwrap();
        assert_eq!(renamed.rows_affected, 1);
        assert_eq!(renamed.insert_id, None);

        let cte = session
            .execute(
                "WITH v(n) AS (SELECT 'Work') INSERT INTO folder (name) SELECT n FROM v",
                &[],
            )
            .await
            .unwrap();
        assert_eq!(cte.rows_affected, 1);
        assert_eq!(cte.insert_id, Some(2));

        let returned = session
            .execute(
                "INSERT INTO folder (name) VALUES (?) RETURNING id",
                &[QueryParam::from("Family")],
            )
            .await
            .unwrap();
        assert_eq!(returned.rows[0]["id"], serde_json::json!(3));
        assert_eq!(returned.rows_affected, 1);
        assert_eq!(returned.insert_id, Some(3));

        session.close().await.unwrap();
    }
}
