//! Site configuration loaded from environment variables.

use std::path::PathBuf;

use anyhow::{bail, Context};

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "127.0.0.1:5000").
    pub bind_addr: String,

    /// SQLite database file.
    pub database_path: String,

    /// Root folder of the theme.
    pub theme_path: PathBuf,

    /// Template folder, relative to `theme_path`.
    pub template_folder: String,

    /// SQL folder, relative to `theme_path`.
    pub sql_folder: String,

    /// Serve without ever writing to the database.
    pub read_only: bool,

    /// Skip the write-ahead-log check (for throwaway databases).
    pub testing: bool,

    /// Maximum Node nesting during one resolution.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1:5000".to_string(),
            database_path: "chill.db".to_string(),
            theme_path: PathBuf::from("."),
            template_folder: "templates".to_string(),
            sql_folder: "queries".to_string(),
            read_only: false,
            testing: false,
            max_depth: 32,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All optional:
    /// - `CHILL_BIND_ADDR` (default: "127.0.0.1:5000")
    /// - `CHILL_DATABASE_PATH` (default: "chill.db")
    /// - `CHILL_THEME_PATH` (default: ".")
    /// - `CHILL_THEME_TEMPLATE_FOLDER` (default: "templates")
    /// - `CHILL_THEME_SQL_FOLDER` (default: "queries")
    /// - `CHILL_READ_ONLY`, `CHILL_TESTING`: booleans (default: false)
    /// - `CHILL_MAX_DEPTH` (default: 32)
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        tracing::info!(
            bind_addr = %config.bind_addr,
            database_path = %config.database_path,
            theme_path = %config.theme_path.display(),
            read_only = config.read_only,
            testing = config.testing,
            max_depth = config.max_depth,
            "chill configuration loaded"
        );

        Ok(config)
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Config::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        let max_depth = match lookup("CHILL_MAX_DEPTH") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("CHILL_MAX_DEPTH must be a positive integer, got '{}'", raw))?,
            None => defaults.max_depth,
        };
        if max_depth == 0 {
            bail!("CHILL_MAX_DEPTH must be at least 1");
        }

        Ok(Config {
            bind_addr: string("CHILL_BIND_ADDR", defaults.bind_addr),
            database_path: string("CHILL_DATABASE_PATH", defaults.database_path),
            theme_path: lookup("CHILL_THEME_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.theme_path),
            template_folder: string("CHILL_THEME_TEMPLATE_FOLDER", defaults.template_folder),
            sql_folder: string("CHILL_THEME_SQL_FOLDER", defaults.sql_folder),
            read_only: flag("CHILL_READ_ONLY", lookup("CHILL_READ_ONLY"))?,
            testing: flag("CHILL_TESTING", lookup("CHILL_TESTING"))?,
            max_depth,
        })
    }

    pub fn template_dir(&self) -> PathBuf {
        self.theme_path.join(&self.template_folder)
    }

    pub fn sql_dir(&self) -> PathBuf {
        self.theme_path.join(&self.sql_folder)
    }
}

fn flag(key: &str, raw: Option<String>) -> anyhow::Result<bool> {
    let Some(raw) = raw else { return Ok(false) };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got '{}'", key, other),
    }
}
