//! `[chill <name> <args>]` expansion in rendered template output.
//!
//! Handlers are registered once at startup. Expansion runs after a template
//! renders, so a shortcode can pull in another page through the evaluator
//! that is rendering the current one, sharing its recursion trail.

use std::collections::HashMap;
use std::sync::LazyLock;

use chill_core::{normalize_path, Method, Params};
use regex::{Captures, Regex};

use crate::error::EvalError;
use crate::evaluator::{Evaluator, Trail};
use crate::resolver::RouteResolver;

static SHORTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[chill\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s+([^\]]*))?\s*\]")
        .expect("shortcode regex should compile")
});

/// A named expansion.
pub trait Shortcode: Send + Sync {
    fn expand(
        &self,
        args: &str,
        evaluator: &Evaluator<'_>,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<String, EvalError>;
}

/// `[chill route <path>]`: the evaluated value of the page at `path`,
/// resolved as a GET. Unknown paths expand to nothing.
pub struct RouteShortcode;

impl Shortcode for RouteShortcode {
    fn expand(
        &self,
        args: &str,
        evaluator: &Evaluator<'_>,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<String, EvalError> {
        let Some(found) = RouteResolver::new(evaluator.store()).resolve(args, Method::Get)? else {
            tracing::debug!(path = args, "route shortcode points at no route");
            return Ok(String::new());
        };
        let mut params = found.params;
        params.extend(request.iter().map(|(k, v)| (k.clone(), v.clone())));
        let value = evaluator.resolve_in(found.node_id, &params, trail)?;
        Ok(value.to_string())
    }
}

/// `[chill page_uri <path>]`: the normalized path.
pub struct PageUriShortcode;

impl Shortcode for PageUriShortcode {
    fn expand(
        &self,
        args: &str,
        _evaluator: &Evaluator<'_>,
        _request: &Params,
        _trail: &mut Trail,
    ) -> Result<String, EvalError> {
        Ok(normalize_path(args))
    }
}

#[derive(Default)]
pub struct ShortcodeRegistry {
    handlers: HashMap<String, Box<dyn Shortcode>>,
}

impl ShortcodeRegistry {
    /// A registry with no handlers; every shortcode is left as written.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `route` and `page_uri`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("route", RouteShortcode);
        registry.register("page_uri", PageUriShortcode);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, handler: impl Shortcode + 'static) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Expands every registered shortcode in `text`. Unregistered names are
    /// copied through unchanged.
    pub fn expand(
        &self,
        text: &str,
        evaluator: &Evaluator<'_>,
        request: &Params,
        trail: &mut Trail,
    ) -> Result<String, EvalError> {
        if self.handlers.is_empty() || !text.contains("[chill") {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in SHORTCODE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&text[last..whole.start()]);
            last = whole.end();
            match self.handlers.get(&caps[1]) {
                Some(handler) => {
                    out.push_str(&handler.expand(args(&caps), evaluator, request, trail)?);
                }
                None => out.push_str(whole.as_str()),
            }
        }
        out.push_str(&text[last..]);
        Ok(out)
    }
}

fn args<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(2).map(|m| m.as_str().trim()).unwrap_or("")
}
