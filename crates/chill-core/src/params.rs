//! Request parameter layering.
//!
//! A request's bind parameters come from several places. They are merged in
//! a fixed precedence, later sources overriding earlier ones:
//!
//! path placeholders < JSON body < form fields < query string < cookies < `method`
//!
//! The `method` entry is always computed from the HTTP verb. A client that
//! supplies its own `method` in any source is rejected, so the verb a query
//! sees can't be spoofed.

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::method::Method;
use crate::value::Value;

/// Named bind parameters, in first-seen order.
pub type Params = IndexMap<String, Value>;

/// The computed parameter holding the request verb.
pub const METHOD_KEY: &str = "method";

/// Keys stripped from the noderequest bag; evaluation sets them itself.
pub const RESERVED_KEYS: [&str; 3] = ["node_id", "name", "value"];

/// Where a request parameter came from, in ascending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamSource {
    Path,
    Json,
    Form,
    Query,
    Cookie,
}

impl ParamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamSource::Path => "path",
            ParamSource::Json => "json body",
            ParamSource::Form => "form",
            ParamSource::Query => "query string",
            ParamSource::Cookie => "cookie",
        }
    }
}

/// Collects parameter layers and merges them by precedence.
///
/// Layers can be added in any order; [`RequestParams::merge`] applies them
/// by [`ParamSource`] order.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    layers: Vec<(ParamSource, Vec<(String, Value)>)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer of parameters from `source`.
    pub fn with<I, K>(mut self, source: ParamSource, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.layers.push((
            source,
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ));
        self
    }

    /// Merges all layers and appends the computed `method`.
    pub fn merge(mut self, method: Method) -> Result<Params, CoreError> {
        self.layers.sort_by_key(|(source, _)| *source);
        let mut merged = Params::new();
        for (source, entries) in self.layers {
            for (key, value) in entries {
                if key == METHOD_KEY {
                    return Err(CoreError::MethodParameter {
                        source_kind: source.as_str(),
                    });
                }
                merged.insert(key, value);
            }
        }
        merged.insert(METHOD_KEY.to_string(), Value::Text(method.as_str().to_string()));
        Ok(merged)
    }
}

/// The noderequest bag: merged parameters minus the reserved keys.
pub fn node_request(params: &Params) -> Params {
    params
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
