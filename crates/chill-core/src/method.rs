//! HTTP verbs and the SQL intents each verb is allowed to run.
//!
//! A Route binds a path and a [`Method`] to a Node. When that Node's query
//! runs, its statement is classified into a [`SqlIntent`] and checked
//! against [`Method::permits`]; a GET can never run an UPDATE, a DELETE can
//! never run an INSERT.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The verbs a Route can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// What a SQL statement does, judged by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlIntent {
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, pragmas and anything else no verb may run.
    Other,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// True for verbs that exist to change stored content.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Method::Put | Method::Patch | Method::Delete)
    }

    /// Whether a statement with the given intent may run for this verb.
    pub fn permits(&self, intent: SqlIntent) -> bool {
        match self {
            Method::Get => intent == SqlIntent::Select,
            Method::Post => matches!(intent, SqlIntent::Select | SqlIntent::Insert),
            Method::Put | Method::Patch => matches!(intent, SqlIntent::Insert | SqlIntent::Update),
            Method::Delete => intent == SqlIntent::Delete,
        }
    }
}

impl SqlIntent {
    /// Classifies a statement by its first keyword, skipping whitespace and
    /// comments. A leading `WITH` is classified by the first data-modifying
    /// keyword that follows it, or as a select if there is none.
    pub fn classify(sql: &str) -> SqlIntent {
        let mut words = keywords(sql);
        match words.next().as_deref() {
            Some("SELECT") | Some("VALUES") => SqlIntent::Select,
            Some("INSERT") | Some("REPLACE") => SqlIntent::Insert,
            Some("UPDATE") => SqlIntent::Update,
            Some("DELETE") => SqlIntent::Delete,
            Some("WITH") => words
                .find_map(|w| match w.as_str() {
                    "INSERT" | "REPLACE" => Some(SqlIntent::Insert),
                    "UPDATE" => Some(SqlIntent::Update),
                    "DELETE" => Some(SqlIntent::Delete),
                    _ => None,
                })
                .unwrap_or(SqlIntent::Select),
            _ => SqlIntent::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SqlIntent::Select => "SELECT",
            SqlIntent::Insert => "INSERT",
            SqlIntent::Update => "UPDATE",
            SqlIntent::Delete => "DELETE",
            SqlIntent::Other => "OTHER",
        }
    }
}

/// Uppercased bare words of `sql`, with comments and string literals removed.
fn keywords(sql: &str) -> std::vec::IntoIter<String> {
    let mut cleaned = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                cleaned.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                cleaned.push(' ');
            }
            '\'' | '"' => {
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
                cleaned.push(' ');
            }
            c if c.is_alphanumeric() || c == '_' => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }
    cleaned
        .split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .into_iter()
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SqlIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(CoreError::UnsupportedMethod(s.to_string())),
        }
    }
}
