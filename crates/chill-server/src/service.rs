//! Request pipeline shared by all page handlers.
//!
//! [`PageService`] holds only immutable, shareable pieces (settings, query
//! store, template renderer, shortcode registry). Each call to
//! [`PageService::handle`] opens its own database connection, which is
//! dropped when the call returns.

use std::sync::Arc;

use chill_core::{Method, ParamSource, RequestParams, Value};
use chill_eval::{EvalConfig, Evaluator, RouteResolver, ShortcodeRegistry, TemplateRenderer};
use chill_storage::{ContentStore, OpenOptions, QueryStore};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub database_path: String,
    pub read_only: bool,
    pub testing: bool,
    pub eval: EvalConfig,
}

/// A request reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub method: Method,
    /// Raw request path; decoding and normalization happen during resolution.
    pub path: String,
    /// Body, query-string and cookie parameters.
    pub params: RequestParams,
}

/// What a successful request produced, before HTTP shaping.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// A value to send back (GET, or POST with a non-empty result).
    Content(Value),
    /// A write was accepted (PUT, PATCH, or POST with nothing to show).
    Created,
    /// A delete was accepted.
    Deleted,
}

#[derive(Clone)]
pub struct PageService {
    settings: SiteSettings,
    queries: Arc<QueryStore>,
    templates: Arc<dyn TemplateRenderer>,
    shortcodes: Arc<ShortcodeRegistry>,
}

impl PageService {
    pub fn new(
        settings: SiteSettings,
        queries: QueryStore,
        templates: Arc<dyn TemplateRenderer>,
        shortcodes: ShortcodeRegistry,
    ) -> Self {
        PageService {
            settings,
            queries: Arc::new(queries),
            templates,
            shortcodes: Arc::new(shortcodes),
        }
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    /// The same site, serving read-only.
    pub fn read_only(&self) -> Self {
        let mut service = self.clone();
        service.settings.read_only = true;
        service
    }

    /// Opens a connection honoring the site's read-only and testing flags.
    pub fn open_store(&self) -> Result<ContentStore, ApiError> {
        let options = OpenOptions {
            read_only: self.settings.read_only,
            testing: self.settings.testing,
        };
        Ok(ContentStore::open(&self.settings.database_path, options)?)
    }

    /// Runs one request: resolve the Route, merge parameters, then evaluate
    /// (GET, POST) or execute (PUT, PATCH, DELETE) the bound Node.
    pub fn handle(&self, request: PageRequest) -> Result<PageOutcome, ApiError> {
        let PageRequest { method, path, params } = request;

        if method.is_mutating() && self.settings.read_only {
            tracing::warn!(method = %method, path = %path, "rejecting write on read-only site");
            return Err(ApiError::ReadOnly(format!(
                "{} is not available on a read-only site",
                method
            )));
        }

        let store = self.open_store()?;
        let Some(found) = RouteResolver::new(&store).resolve(&path, method)? else {
            return Err(ApiError::NotFound(format!("no route for {} {}", method, path)));
        };
        let params = params.with(ParamSource::Path, found.params).merge(method)?;

        let evaluator = Evaluator::new(
            &store,
            &self.queries,
            self.templates.as_ref(),
            &self.shortcodes,
        )
        .with_config(self.settings.eval)
        .with_method(method);

        match method {
            Method::Get => {
                let value = evaluator.resolve(found.node_id, &params)?;
                if value.is_empty() {
                    return Err(ApiError::NotFound(format!("nothing at {}", found.path)));
                }
                Ok(PageOutcome::Content(value))
            }
            Method::Post => {
                let value = evaluator.resolve(found.node_id, &params)?;
                if value.is_empty() {
                    Ok(PageOutcome::Created)
                } else {
                    Ok(PageOutcome::Content(value))
                }
            }
            Method::Put | Method::Patch | Method::Delete => {
                let result = evaluator.execute(found.node_id, &params)?;
                tracing::debug!(
                    method = %method,
                    node_id = %found.node_id,
                    changes = result.changes,
                    "executed node query"
                );
                if method == Method::Delete {
                    Ok(PageOutcome::Deleted)
                } else {
                    Ok(PageOutcome::Created)
                }
            }
        }
    }
}
