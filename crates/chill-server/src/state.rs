//! Application state shared by all handlers.
//!
//! There is no shared database handle: [`PageService`] opens a connection
//! per request, so the state is just an `Arc` around immutable pieces.

use std::sync::Arc;

use chill_eval::{EvalConfig, MiniJinjaRenderer, ShortcodeRegistry, TemplateRenderer};
use chill_storage::{ContentStore, OpenOptions, QueryStore, StorageError};
use tempfile::TempDir;

use crate::config::Config;
use crate::error::ApiError;
use crate::service::{PageService, SiteSettings};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PageService>,
    /// Holds the throwaway database of [`AppState::in_memory_with`]; the
    /// directory is removed when the last clone drops.
    _scratch: Option<Arc<TempDir>>,
}

impl AppState {
    /// State for the site described by `config`. Templates and queries load
    /// from the theme folders.
    pub fn new(config: &Config) -> Self {
        let settings = SiteSettings {
            database_path: config.database_path.clone(),
            read_only: config.read_only,
            testing: config.testing,
            eval: EvalConfig {
                max_depth: config.max_depth,
            },
        };
        let service = PageService::new(
            settings,
            QueryStore::with_theme_dir(config.sql_dir()),
            Arc::new(MiniJinjaRenderer::from_dir(config.template_dir())),
            ShortcodeRegistry::with_defaults(),
        );
        AppState::from_service(service)
    }

    pub fn from_service(service: PageService) -> Self {
        AppState {
            service: Arc::new(service),
            _scratch: None,
        }
    }

    /// A fresh, initialized throwaway database with no templates (for
    /// testing). The database lives until the last clone of the state drops.
    pub fn in_memory() -> Result<Self, ApiError> {
        Self::in_memory_with(QueryStore::bundled(), Arc::new(MiniJinjaRenderer::empty()))
    }

    /// Like [`in_memory`](Self::in_memory) with the given queries and
    /// templates.
    pub fn in_memory_with(
        queries: QueryStore,
        templates: Arc<dyn TemplateRenderer>,
    ) -> Result<Self, ApiError> {
        let scratch = tempfile::Builder::new()
            .prefix("chill-")
            .tempdir()
            .map_err(StorageError::from)?;
        let path = scratch.path().join("site.db");
        let settings = SiteSettings {
            database_path: path.to_string_lossy().into_owned(),
            read_only: false,
            testing: true,
            eval: EvalConfig::default(),
        };

        let mut store = ContentStore::open(
            &settings.database_path,
            OpenOptions::read_write().testing(true),
        )?;
        store.init()?;

        let service = PageService::new(
            settings,
            queries,
            templates,
            ShortcodeRegistry::with_defaults(),
        );
        Ok(AppState {
            _scratch: Some(Arc::new(scratch)),
            ..AppState::from_service(service)
        })
    }
}
