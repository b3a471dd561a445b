//! Storage-layer option and result types.

use chill_core::{Params, SqlIntent, Value};

/// How a store connection is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Open with SQLite's read-only flag; every write fails.
    pub read_only: bool,
    /// Test mode: skip the write-ahead-log gate (in-memory databases
    /// cannot use WAL).
    pub testing: bool,
}

impl OpenOptions {
    pub fn read_write() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        OpenOptions {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn testing(mut self, testing: bool) -> Self {
        self.testing = testing;
        self
    }
}

/// The result of running one ad-hoc statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRows {
    /// Result column names; empty for statements that return no rows.
    pub columns: Vec<String>,
    /// One mapping per row, keyed by column name in column order.
    pub rows: Vec<Params>,
    /// Rows changed by a data-modifying statement.
    pub changes: usize,
    /// How the statement was classified.
    pub intent: SqlIntent,
}

impl QueryRows {
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// The rows as a sequence of mappings.
    pub fn into_value(self) -> Value {
        Value::List(self.rows.into_iter().map(Value::Map).collect())
    }
}
