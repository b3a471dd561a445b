//! Recursive Node evaluation.
//!
//! A Node's value comes from, in order: its own Query (when it has no
//! literal value), its outgoing Links (when the Query did not run or
//! produced nothing), then short-circuiting. A bound Template turns the
//! result into text.
//!
//! Every Node entered during one resolution is recorded on a [`Trail`].
//! Re-entering a Node already on the trail is a [`EvalError::Cycle`];
//! growing the trail past [`EvalConfig::max_depth`] is
//! [`EvalError::DepthExceeded`].

use chill_core::{
    node_request, short_circuit, LinkMerge, Method, Node, NodeId, Params, Value, LINK_QUERY,
};
use chill_storage::{ContentStore, QueryRows, QueryStore, StorageError};

use crate::error::EvalError;
use crate::shortcode::ShortcodeRegistry;
use crate::template::TemplateRenderer;

/// Configuration for the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct EvalConfig {
    /// Maximum number of nested Nodes in one resolution. Default: 32.
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig { max_depth: 32 }
    }
}

/// The Nodes currently being resolved, outermost first.
#[derive(Debug, Clone, Default)]
pub struct Trail {
    nodes: Vec<NodeId>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn enter(&mut self, node: NodeId, max_depth: usize) -> Result<(), EvalError> {
        if self.nodes.contains(&node) {
            return Err(EvalError::Cycle {
                node,
                trail: self.nodes.clone(),
            });
        }
        if self.nodes.len() >= max_depth {
            return Err(EvalError::DepthExceeded {
                node,
                limit: max_depth,
            });
        }
        self.nodes.push(node);
        Ok(())
    }

    fn leave(&mut self) {
        self.nodes.pop();
    }
}

pub struct Evaluator<'a> {
    store: &'a ContentStore,
    queries: &'a QueryStore,
    templates: &'a dyn TemplateRenderer,
    shortcodes: &'a ShortcodeRegistry,
    config: EvalConfig,
    method: Method,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        store: &'a ContentStore,
        queries: &'a QueryStore,
        templates: &'a dyn TemplateRenderer,
        shortcodes: &'a ShortcodeRegistry,
    ) -> Self {
        Evaluator {
            store,
            queries,
            templates,
            shortcodes,
            config: EvalConfig::default(),
            method: Method::Get,
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// The verb whose SQL policy applies to the queries this evaluator runs.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn store(&self) -> &'a ContentStore {
        self.store
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Resolves a routed Node to its value, or its rendered text if it has
    /// a Template.
    ///
    /// The Node's own Query binds the full `params`. Linked children,
    /// query rows and shortcode sub-renders only see the noderequest bag.
    pub fn resolve(&self, node_id: NodeId, params: &Params) -> Result<Value, EvalError> {
        let request = node_request(params);
        self.visit(node_id, None, Some(params), &request, &mut Trail::new())
            .map(|(_, value)| value)
    }

    /// Resolves a sub-render against the noderequest bag, continuing an
    /// existing trail.
    pub fn resolve_in(
        &self,
        node_id: NodeId,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<Value, EvalError> {
        let request = node_request(request);
        self.visit(node_id, None, None, &request, trail)
            .map(|(_, value)| value)
    }

    /// Runs only the Node's own Query with the full `params`. Used by PUT,
    /// PATCH and DELETE, which mutate and never assemble a value.
    pub fn execute(&self, node_id: NodeId, params: &Params) -> Result<QueryRows, EvalError> {
        let node = self.store.get_node(node_id)?;
        let query = node.own_query().ok_or(EvalError::NoQuery {
            node: node_id,
            method: self.method,
        })?;
        Ok(self.run_named(node_id, query, params, self.method)?)
    }

    /// Enters `node_id` on the trail and evaluates it, returning the key it
    /// should appear under in a parent (`key`, or the Node's name).
    /// `own` overrides the bind set of the Node's own Query; children are
    /// always visited with `None`.
    fn visit(
        &self,
        node_id: NodeId,
        key: Option<String>,
        own: Option<&Params>,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<(String, Value), EvalError> {
        trail.enter(node_id, self.config.max_depth)?;
        let result = self.store.get_node(node_id).map_err(EvalError::from).and_then(|node| {
            let value = self.evaluate(&node, own.unwrap_or(request), request, trail)?;
            Ok((key.unwrap_or(node.name), value))
        });
        trail.leave();
        result
    }

    fn evaluate(
        &self,
        node: &Node,
        own: &Params,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<Value, EvalError> {
        let mut value = node.value.clone().map(Value::Text).unwrap_or(Value::Null);

        let mut queried = false;
        if node.value.is_none() {
            if let Some(query) = node.own_query() {
                if let Some(result) = self.query_value(node.id, query, own, request, trail)? {
                    queried = !result.is_empty();
                    value = result;
                }
            }
        }

        if !queried {
            let linked = self.linked_values(node.id, request, trail)?;
            if !linked.is_empty() {
                let (merged, merge) = value.absorb(Value::List(linked));
                if merge == LinkMerge::ReplacedScalar {
                    tracing::warn!(
                        node_id = %node.id,
                        "linked children replace the node's literal value"
                    );
                }
                value = merged;
            }
        }

        let value = short_circuit(value);
        match &node.template {
            Some(template) => {
                let text = self.templates.render(template, &value)?;
                let text = self.shortcodes.expand(&text, self, request, trail)?;
                Ok(Value::Text(text))
            }
            None => Ok(value),
        }
    }

    /// The Node's own Query result, or `None` when it failed or ran a
    /// statement that returns no rows.
    fn query_value(
        &self,
        node_id: NodeId,
        query: &str,
        own: &Params,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<Option<Value>, EvalError> {
        let rows = match self.run_named(node_id, query, own, self.method) {
            Ok(rows) => rows,
            Err(err) => return degrade(node_id, query, err).map(|()| None),
        };
        if rows.has_column("node_id") {
            return Ok(Some(Value::List(self.include_rows(rows.rows, request, trail)?)));
        }
        if rows.returns_rows() {
            return Ok(Some(rows.into_value()));
        }
        Ok(None)
    }

    /// One `{name: value}` entry per linked child, in link order.
    fn linked_values(
        &self,
        node_id: NodeId,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<Vec<Value>, EvalError> {
        match self.run_named(node_id, LINK_QUERY, request, Method::Get) {
            Ok(rows) => self.include_rows(rows.rows, request, trail),
            Err(err) => degrade(node_id, LINK_QUERY, err).map(|()| Vec::new()),
        }
    }

    /// Resolves rows that point at Nodes through a `node_id` column, keyed
    /// by the row's `name` column when present.
    fn include_rows(
        &self,
        rows: Vec<Params>,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<Vec<Value>, EvalError> {
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(child) = row.get("node_id").and_then(as_node_id) else {
                tracing::warn!(row = ?row, "row has no usable node_id");
                continue;
            };
            let key = row.get("name").and_then(Value::as_text).map(String::from);
            match self.visit(child, key, None, request, trail) {
                Ok((key, value)) => entries.push(Value::entry(key, value)),
                Err(EvalError::Storage(StorageError::NodeNotFound(missing))) => {
                    tracing::warn!(node_id = %missing, "row points at a missing node");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(entries)
    }

    fn run_named(
        &self,
        node_id: NodeId,
        query: &str,
        request: &Params,
        method: Method,
    ) -> Result<QueryRows, StorageError> {
        let sql = self.queries.fetch(query)?;
        let mut params = request.clone();
        params.insert("node_id".to_string(), Value::Integer(node_id.0));
        self.store.run_query(&sql, &params, method)
    }
}

/// Policy failures propagate; anything else is logged and the query
/// contributes nothing.
fn degrade(node_id: NodeId, query: &str, err: StorageError) -> Result<(), EvalError> {
    match err {
        StorageError::ReadOnly | StorageError::IntentMismatch { .. } => Err(err.into()),
        other => {
            tracing::warn!(node_id = %node_id, query, error = %other, "query failed");
            Ok(())
        }
    }
}

fn as_node_id(value: &Value) -> Option<NodeId> {
    match value {
        Value::Integer(id) => Some(NodeId(*id)),
        Value::Text(text) => text.trim().parse().ok().map(NodeId),
        _ => None,
    }
}
