//! Dialect helpers shared by the backends.

use crate::error::{DalError, DalResult, DbFailure};
use crate::models::Query;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Append a locking clause to a read, leaving the input untouched.
pub fn append_locking_clause(query: &Query, clause: &str) -> Query {
    let text = query.text.trim_end().trim_end_matches(';').trim_end();
    Query {
        text: format!("{} {}", text, clause),
        values: query.values.clone(),
    }
}

/// An integer column type, with optional display width, UNSIGNED and NOT NULL.
const INTEGER_COLUMN: &str =
    r"(?:TINY|SMALL|MEDIUM|BIG)?INT(?:EGER)?(?:\s*\(\s*\d+\s*\))?(?:\s+UNSIGNED)?(?:\s+NOT\s+NULL)?";

static INTEGER_PRIMARY_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b{}\s+PRIMARY\s+KEY\b", INTEGER_COLUMN)).expect("static regex")
});

/// Table-level key on a single column, e.g. `PRIMARY KEY (id)`.
static TABLE_PRIMARY_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bPRIMARY\s+KEY\s*\(\s*`?(\w+)`?\s*\)").expect("static regex")
});

static AUTO_INCREMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAUTO_INCREMENT\b").expect("static regex"));

/// Mark the integer primary key column as AUTO_INCREMENT (MySQL spelling).
///
/// Handles an inline `id INT(11) UNSIGNED PRIMARY KEY` and a table-level
/// `PRIMARY KEY (id)` naming one integer column. Composite keys, non-integer
/// keys and statements that already mention AUTO_INCREMENT are returned
/// unchanged.
pub fn add_auto_increment(create_statement: &str) -> String {
    if AUTO_INCREMENT.is_match(create_statement) {
        return create_statement.to_string();
    }
    if INTEGER_PRIMARY_KEY.is_match(create_statement) {
        return INTEGER_PRIMARY_KEY
            .replace_all(create_statement, "${0} AUTO_INCREMENT")
            .into_owned();
    }
    match TABLE_PRIMARY_KEY.captures(create_statement) {
        Some(key) => mark_column(create_statement, &key[1]),
        None => create_statement.to_string(),
    }
}

/// Append AUTO_INCREMENT to the definition of `column` if it is an integer column.
fn mark_column(create_statement: &str, column: &str) -> String {
    let pattern = format!(
        r"(?i)[(,]\s*`?{}`?\s+{}",
        regex::escape(column),
        INTEGER_COLUMN
    );
    match Regex::new(&pattern) {
        Ok(definition) => definition
            .replacen(create_statement, 1, "${0} AUTO_INCREMENT")
            .into_owned(),
        Err(_) => create_statement.to_string(),
    }
}

/// Epoch seconds to a UTC instant.
pub fn epoch_to_utc(raw: i64) -> DalResult<DateTime<Utc>> {
    DateTime::from_timestamp(raw, 0).ok_or_else(|| {
        DalError::invalid_input(format!("Stored date {} is outside the supported range", raw))
    })
}

/// Generate a helpful suggestion for connection errors.
pub fn connection_suggestion(provider: &str, failure: &DbFailure) -> String {
    let error_str = failure.message.to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", provider);
    }

    if error_str.contains("access denied")
        || error_str.contains("authentication")
        || error_str.contains("password")
    {
        return "Verify the username and password in the connection string".to_string();
    }

    if error_str.contains("unknown database") || error_str.contains("does not exist") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("unable to open database") {
        return "Check the database file path, or add ?create_if_missing=true".to_string();
    }

    if error_str.contains("timed out") {
        return "The server did not answer in time; check network reachability".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    format!("Verify the {} connection string and server status", provider)
}
