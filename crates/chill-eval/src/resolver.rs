//! Request path to Node resolution.

use std::borrow::Cow;

use chill_core::{normalize_path, Method, NodeId, Params, RuleTable};
use chill_storage::{ContentStore, StorageError};

/// A resolved Route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub node_id: NodeId,
    /// The normalized request path.
    pub path: String,
    /// The placeholder pattern that matched, if the exact lookup missed.
    pub pattern: Option<String>,
    /// Typed values captured by the pattern's placeholders.
    pub params: Params,
}

pub struct RouteResolver<'a> {
    store: &'a ContentStore,
}

impl<'a> RouteResolver<'a> {
    pub fn new(store: &'a ContentStore) -> Self {
        RouteResolver { store }
    }

    /// Finds the Node for a raw request path and verb.
    ///
    /// Exact Routes win. Otherwise placeholder Routes for the verb are
    /// compiled and matched in weight order; the winning pattern string is
    /// then looked up like an exact path.
    pub fn resolve(&self, raw_path: &str, method: Method) -> Result<Option<RouteMatch>, StorageError> {
        let decoded = urlencoding::decode(raw_path).unwrap_or(Cow::Borrowed(raw_path));
        let path = normalize_path(&decoded);

        if let Some(node_id) = self.store.node_for_route(&path, method)? {
            return Ok(Some(RouteMatch {
                node_id,
                path,
                pattern: None,
                params: Params::new(),
            }));
        }

        let (table, rejected) = RuleTable::build(self.store.pattern_routes(method)?);
        for err in rejected {
            tracing::warn!(error = %err, "skipping invalid route pattern");
        }
        let Some(matched) = table.match_path(&path) else {
            tracing::debug!(path = %path, method = %method, "no route");
            return Ok(None);
        };

        let node_id = self.store.node_for_route(&matched.pattern, method)?;
        Ok(node_id.map(|node_id| RouteMatch {
            node_id,
            path,
            pattern: Some(matched.pattern),
            params: matched.params,
        }))
    }
}
