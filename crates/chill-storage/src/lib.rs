//! SQLite persistence for chill content graphs.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`schema`]: connection setup, the journal-mode gate, migrations
//! - [`sqlite`]: [`ContentStore`], the Node/Link/Route/Query/Template store
//!   and the ad-hoc query runner used during evaluation
//! - [`queries`]: [`QueryStore`], named SQL files with theme overrides
//! - [`graph`]: cycle detection over the Link graph
//! - [`types`]: OpenOptions and QueryRows

pub mod error;
pub mod graph;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use error::StorageError;
pub use queries::QueryStore;
pub use sqlite::ContentStore;
pub use types::{OpenOptions, QueryRows};
