//! HTTP handlers.
//!
//! Handlers only translate between HTTP and [`crate::service::PageService`].

pub mod health;
pub mod page;
