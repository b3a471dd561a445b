//! Route resolution and Node evaluation for chill.
//!
//! Given an open [`chill_storage::ContentStore`], this crate turns a request
//! path into a Node and the Node into a [`chill_core::Value`] (or rendered
//! text when the Node has a Template).
//!
//! # Modules
//!
//! - [`resolver`]: path + verb to Node id and typed path parameters
//! - [`evaluator`]: recursive Node resolution with cycle and depth guards,
//!   and query execution for mutating verbs
//! - [`template`]: the [`TemplateRenderer`] seam and its minijinja backend
//! - [`shortcode`]: `[chill ...]` expansion in rendered output
//! - [`error`]: EvalError

pub mod error;
pub mod evaluator;
pub mod resolver;
pub mod shortcode;
pub mod template;

pub use error::EvalError;
pub use evaluator::{EvalConfig, Evaluator, Trail};
pub use resolver::{RouteMatch, RouteResolver};
pub use shortcode::{Shortcode, ShortcodeRegistry};
pub use template::{MiniJinjaRenderer, TemplateError, TemplateRenderer};
