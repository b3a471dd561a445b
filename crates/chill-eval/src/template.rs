//! Template rendering seam.
//!
//! The evaluator only sees [`TemplateRenderer`]. [`MiniJinjaRenderer`] is the
//! default backend and loads templates from the theme's template folder.

use std::path::Path;

use chill_core::Value;
use minijinja::{Environment, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("failed to render template '{name}': {reason}")]
    Render { name: String, reason: String },
}

/// Renders a named template with a resolved value as its context.
///
/// A mapping value is the context itself; any other value is exposed to the
/// template as `value`.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, context: &Value) -> Result<String, TemplateError>;
}

pub struct MiniJinjaRenderer {
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    /// Loads templates lazily from `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir));
        MiniJinjaRenderer { env }
    }

    /// Renderer over in-memory `(name, source)` pairs.
    pub fn from_templates<I, N, S>(templates: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut env = Environment::new();
        for (name, source) in templates {
            let name = name.into();
            env.add_template_owned(name.clone(), source.into())
                .map_err(|e| TemplateError::Render {
                    name,
                    reason: e.to_string(),
                })?;
        }
        Ok(MiniJinjaRenderer { env })
    }

    /// A renderer with no templates; every render is `NotFound`.
    pub fn empty() -> Self {
        MiniJinjaRenderer {
            env: Environment::new(),
        }
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(&self, name: &str, context: &Value) -> Result<String, TemplateError> {
        let failed = |e: minijinja::Error| TemplateError::Render {
            name: name.to_string(),
            reason: e.to_string(),
        };
        let template = self.env.get_template(name).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => TemplateError::NotFound(name.to_string()),
            _ => failed(e),
        })?;
        let ctx = match context {
            Value::Map(_) => minijinja::Value::from_serialize(context),
            other => minijinja::context! { value => minijinja::Value::from_serialize(other) },
        };
        template.render(ctx).map_err(failed)
    }
}
