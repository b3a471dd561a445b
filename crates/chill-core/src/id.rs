//! The Node id newtype.
//!
//! The inner `i64` matches SQLite's `INTEGER PRIMARY KEY`, so ids move
//! between rows and Rust without conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a content Node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
