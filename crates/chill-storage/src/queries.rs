//! Named SQL files.
//!
//! A query is looked up by file name, first in the theme's SQL directory and
//! then in the set bundled with this crate, so a theme can override any
//! bundled query by shipping a file of the same name.

use std::borrow::Cow;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chill_core::LINK_QUERY;

use crate::error::StorageError;

const BUNDLED: &[(&str, &str)] = &[(
    LINK_QUERY,
    include_str!("queries/select_link_node_from_node.sql"),
)];

#[derive(Debug, Clone, Default)]
pub struct QueryStore {
    theme_dir: Option<PathBuf>,
}

impl QueryStore {
    /// Only the bundled queries.
    pub fn bundled() -> Self {
        QueryStore::default()
    }

    /// Theme files in `dir` shadow the bundled queries.
    pub fn with_theme_dir(dir: impl Into<PathBuf>) -> Self {
        QueryStore {
            theme_dir: Some(dir.into()),
        }
    }

    pub fn theme_dir(&self) -> Option<&Path> {
        self.theme_dir.as_deref()
    }

    pub fn bundled_names() -> impl Iterator<Item = &'static str> {
        BUNDLED.iter().map(|(name, _)| *name)
    }

    /// Returns the SQL text for `name`.
    pub fn fetch(&self, name: &str) -> Result<Cow<'static, str>, StorageError> {
        if !is_file_name(name) {
            return Err(StorageError::QueryNotFound(name.to_string()));
        }
        if let Some(dir) = &self.theme_dir {
            match fs::read_to_string(dir.join(name)) {
                Ok(sql) => return Ok(Cow::Owned(sql)),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        BUNDLED
            .iter()
            .find(|(bundled, _)| *bundled == name)
            .map(|(_, sql)| Cow::Borrowed(*sql))
            .ok_or_else(|| StorageError::QueryNotFound(name.to_string()))
    }
}

fn is_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(|c: char| c == '/' || c == '\\')
}
