//! HTTP surface for chill sites.
//!
//! Every path other than `/_health` is dispatched through one handler that
//! collects request parameters, resolves the Route, and evaluates the bound
//! Node on a blocking thread with its own database connection.

pub mod config;
pub mod error;
pub mod handlers;
pub mod request;
pub mod router;
pub mod service;
pub mod state;

pub use config::Config;
pub use router::build_router;
pub use state::AppState;
