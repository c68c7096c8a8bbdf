//! Query-related data models.
//!
//! A [`Query`] is the provider-agnostic statement handed in by the query
//! builder: parameterized text plus positional bind values. A [`QueryResult`]
//! is what comes back out of the statement adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Parse a loosely-typed textual value, as given on the command line.
    ///
    /// `null`, `true` and `false` map to their SQL counterparts, numbers to
    /// `Int` or `Float`, and anything else is bound as text.
    pub fn parse_loose(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Self::Int(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            if v.is_finite() {
                return Self::Float(v);
            }
        }
        Self::Text(raw.to_string())
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A parameterized statement and its positional bind values.
///
/// Produced by the query builder and treated as immutable input: provider
/// operations that rewrite a query (such as `for_update`) return a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub values: Vec<QueryParam>,
}

impl Query {
    /// Create a query without bind values.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            values: Vec::new(),
        }
    }

    /// Create a query with the given bind values.
    pub fn with_values(text: impl Into<String>, values: Vec<QueryParam>) -> Self {
        Self {
            text: text.into(),
            values,
        }
    }

    /// Append a bind value.
    pub fn bind(mut self, value: impl Into<QueryParam>) -> Self {
        self.values.push(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "BIGINT", "VARCHAR", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Outcome of executing one statement.
///
/// Row-producing statements fill `columns` and `rows`. Writes report
/// `rows_affected` and, when the statement generated one, the `insert_id`.
/// A write with a RETURNING clause fills all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub columns: Vec<ColumnMetadata>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub rows_affected: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub insert_id: Option<i64>,
}

impl QueryResult {
    /// Result for a write statement (INSERT/UPDATE/DELETE/DDL).
    pub fn write_result(rows_affected: u64, insert_id: Option<i64>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected,
            insert_id,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First row, if any.
    pub fn first(&self) -> Option<&serde_json::Map<String, JsonValue>> {
        self.rows.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_types() {
        assert!(QueryParam::Null.is_null());
        assert!(!QueryParam::Bool(true).is_null());
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(QueryParam::from("hello").type_name(), "text");
        assert_eq!(QueryParam::from(None::<i64>), QueryParam::Null);
        assert_eq!(QueryParam::from(Some(7)), QueryParam::Int(7));
    }

    #[test]
    fn test_parse_loose() {
        assert_eq!(QueryParam::parse_loose("NULL"), QueryParam::Null);
        assert_eq!(QueryParam::parse_loose("true"), QueryParam::Bool(true));
        assert_eq!(QueryParam::parse_loose("-12"), QueryParam::Int(-12));
        assert_eq!(QueryParam::parse_loose("1.5"), QueryParam::Float(1.5));
        assert_eq!(
            QueryParam::parse_loose("inbox"),
            QueryParam::Text("inbox".to_string())
        );
        // "inf" parses as f64 but is not a usable SQL literal
        assert_eq!(
            QueryParam::parse_loose("inf"),
            QueryParam::Text("inf".to_string())
        );
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new("INSERT INTO message (recording, duration) VALUES (?, ?)")
            .bind("greeting.wav")
            .bind(10);
        assert_eq!(query.values.len(), 2);
        assert_eq!(query.values[1], QueryParam::Int(10));
    }

    #[test]
    fn test_query_serde() {
        let json = r#"{"text":"SELECT 1"}"#;
        let query: Query = serde_json::from_str(json).unwrap();
        assert_eq!(query, Query::new("SELECT 1"));
    }

    #[test]
    fn test_write_result_serialization_skips_rows() {
        let result = QueryResult::write_result(1, Some(5));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["rows_affected"], 1);
        assert_eq!(value["insert_id"], 5);
        assert!(value.get("rows").is_none());
    }
}
