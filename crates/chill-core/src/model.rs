//! Persisted content records.

use serde::{Deserialize, Serialize};

use crate::id::NodeId;
use crate::method::Method;

/// Name of the built-in query that fetches a Node's linked children.
///
/// A Node bound to this query (or to no query) is assembled from its Links.
pub const LINK_QUERY: &str = "select_link_node_from_node.sql";

/// A unit of content, with its Template and Query references resolved to
/// their names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub value: Option<String>,
    pub template: Option<String>,
    pub query: Option<String>,
}

impl Node {
    /// The bound query, unless it is absent or the built-in link query.
    pub fn own_query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| *q != LINK_QUERY)
    }
}

/// A directed edge from a Node to a child Node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub node_id: NodeId,
    pub target_node_id: NodeId,
    /// Overrides the child's name in the parent's assembled value.
    pub name: Option<String>,
}

/// A binding from a path (exact or pattern) and verb to a Node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub node_id: NodeId,
    pub weight: i64,
    pub method: Method,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(query: Option<&str>) -> Node {
        Node {
            id: NodeId(1),
            name: "n".into(),
            value: None,
            template: None,
            query: query.map(String::from),
        }
    }

    #[test]
    fn link_query_is_not_an_own_query() {
        assert_eq!(node(None).own_query(), None);
        assert_eq!(node(Some(LINK_QUERY)).own_query(), None);
        assert_eq!(node(Some("select_pages.sql")).own_query(), Some("select_pages.sql"));
    }
}
