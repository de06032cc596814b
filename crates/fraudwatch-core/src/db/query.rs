//! Free-form SQL execution for the copilot
//!
//! Results are always rectangular. Drivers have been seen to report more
//! result columns than a row carries; when that happens the column list is
//! cut down to the width of the first row (see [`reconcile_columns`]).

use rusqlite::types::ValueRef;
use rusqlite::Statement;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::Database;
use crate::error::{Error, Result};
use crate::sql_guard;

/// Tabular result of an executed statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names, in select-list order
    pub columns: Vec<String>,
    /// Rows, each exactly `columns.len()` wide
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows as ordered `column -> value` mappings
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, Value>>()
            })
            .collect()
    }

    /// Records rendered as a JSON array, the form handed to the explainer
    pub fn records_json(&self) -> String {
        Value::Array(self.to_records().into_iter().map(Value::Object).collect()).to_string()
    }
}

/// Build a rectangular result from reported column names and fetched rows
///
/// - No rows: empty result, no column information kept.
/// - More names than values in the first row: names truncated to that width.
/// - Fewer names than values in the first row: synthetic `column_N` names added.
/// - Any later row of a different width is truncated or padded with NULL.
pub fn reconcile_columns(mut columns: Vec<String>, rows: Vec<Vec<Value>>) -> QueryResult {
    let width = match rows.first() {
        Some(first) => first.len(),
        None => return QueryResult::default(),
    };

    if columns.len() > width {
        debug!(
            reported = columns.len(),
            width, "Truncating column list to row width"
        );
        columns.truncate(width);
    }
    while columns.len() < width {
        columns.push(format!("column_{}", columns.len() + 1));
    }

    let rows = rows
        .into_iter()
        .map(|mut row| {
            row.resize(width, Value::Null);
            row
        })
        .collect();

    QueryResult { columns, rows }
}

/// Convert a SQLite cell into a JSON scalar
fn cell_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

/// Fetch every row of a prepared statement
fn collect_rows(stmt: &mut Statement<'_>) -> Result<QueryResult> {
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = stmt.column_count();

    let mut fetched = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(cell_value(row.get_ref(i)?));
        }
        fetched.push(values);
    }

    Ok(reconcile_columns(columns, fetched))
}

impl Database {
    /// Execute SQL as given and return every row
    ///
    /// No statement-kind check happens here; callers running model-generated
    /// SQL should use [`Database::execute_read_only_query`].
    pub fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        collect_rows(&mut stmt)
    }

    /// Execute SQL only if it is a single read-only statement
    ///
    /// The lexical guard runs first, then SQLite's own parser must agree the
    /// prepared statement cannot write.
    pub fn execute_read_only_query(&self, sql: &str) -> Result<QueryResult> {
        sql_guard::check_read_only(sql)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(Error::Rejected(
                "statement would modify the database".to_string(),
            ));
        }

        let result = collect_rows(&mut stmt)?;
        debug!(
            rows = result.row_count(),
            columns = result.columns.len(),
            "Read-only query executed"
        );
        Ok(result)
    }
}
