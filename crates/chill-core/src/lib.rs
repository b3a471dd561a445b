//! Core data model for the chill content engine.
//!
//! Everything in this crate is pure: no I/O, no database handles. The
//! storage, evaluation and HTTP crates build on these types.
//!
//! # Modules
//!
//! - [`value`]: the resolved [`Value`] union and the short-circuit collapse
//! - [`path`]: request path normalization
//! - [`rule`]: placeholder route patterns and the weighted rule table
//! - [`method`]: HTTP verbs and the SQL intents each verb may run
//! - [`params`]: request parameter layering and the noderequest bag
//! - [`model`]: Node, Link and Route records
//! - [`id`]: the Node id newtype
//! - [`error`]: CoreError

pub mod error;
pub mod id;
pub mod method;
pub mod model;
pub mod params;
pub mod path;
pub mod rule;
pub mod value;

pub use error::CoreError;
pub use id::NodeId;
pub use method::{Method, SqlIntent};
pub use model::{Link, Node, Route, LINK_QUERY};
pub use params::{node_request, ParamSource, Params, RequestParams, METHOD_KEY, RESERVED_KEYS};
pub use path::normalize_path;
pub use rule::{Converter, Rule, RuleMatch, RuleTable};
pub use value::{short_circuit, LinkMerge, Value};
