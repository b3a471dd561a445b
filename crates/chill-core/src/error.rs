//! Core error types for chill-core.

use thiserror::Error;

/// Errors produced by the pure core: rule compilation, verb parsing and
/// request parameter merging.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A route pattern could not be compiled into a rule.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidRule { pattern: String, reason: String },

    /// The HTTP verb is not one the engine maps to content.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// A client tried to supply the reserved `method` parameter.
    #[error("parameter 'method' may not be supplied by the client ({source_kind})")]
    MethodParameter { source_kind: &'static str },
}
