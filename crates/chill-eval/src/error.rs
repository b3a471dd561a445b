//! Evaluation errors.

use chill_core::{Method, NodeId};
use chill_storage::StorageError;
use thiserror::Error;

use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A Node was reached again while it was still being resolved.
    #[error("link cycle detected at node {node} (depth {})", .trail.len())]
    Cycle { node: NodeId, trail: Vec<NodeId> },

    #[error("resolution depth limit ({limit}) exceeded at node {node}")]
    DepthExceeded { node: NodeId, limit: usize },

    /// A mutating verb reached a Node with nothing to execute.
    #[error("node {node} has no query to run for {method}")]
    NoQuery { node: NodeId, method: Method },
}
