//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the error type of every handler. Its `IntoResponse`
//! produces a JSON body with a machine-readable code. Errors from the lower
//! crates convert into it through `From`, which is where the status code
//! policy lives.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use chill_core::CoreError;
use chill_eval::{EvalError, TemplateError};
use chill_storage::StorageError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "READ_ONLY").
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No route, no Node, no query file, or no template (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A write against a read-only site (400).
    #[error("read-only: {0}")]
    ReadOnly(String),

    /// The request conflicts with the verb's SQL policy (400).
    #[error("method conflict: {0}")]
    MethodConflict(String),

    /// A verb chill does not serve (405).
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::ReadOnly(_) | ApiError::MethodConflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ApiErrorDetail {
        let (code, message) = match self {
            ApiError::NotFound(msg) => ("NOT_FOUND", msg),
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg),
            ApiError::ReadOnly(msg) => ("READ_ONLY", msg),
            ApiError::MethodConflict(msg) => ("METHOD_CONFLICT", msg),
            ApiError::MethodNotAllowed(msg) => ("METHOD_NOT_ALLOWED", msg),
            ApiError::InternalError(msg) => ("INTERNAL_ERROR", msg),
        };
        ApiErrorDetail {
            code,
            message: message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "error": self.detail(),
        });

        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, ApiError::MethodNotAllowed(_)) {
            response.headers_mut().insert(
                header::ALLOW,
                header::HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE"),
            );
        }
        response
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::UnsupportedMethod(_) => ApiError::MethodNotAllowed(err.to_string()),
            CoreError::MethodParameter { .. } => ApiError::MethodConflict(err.to_string()),
            CoreError::InvalidRule { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NodeNotFound(_) | StorageError::QueryNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StorageError::ReadOnly => ApiError::ReadOnly(err.to_string()),
            StorageError::IntentMismatch { .. } => ApiError::MethodConflict(err.to_string()),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        match &err {
            TemplateError::NotFound(_) => ApiError::NotFound(err.to_string()),
            TemplateError::Render { .. } => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<EvalError> for ApiError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Storage(err) => err.into(),
            EvalError::Template(err) => err.into(),
            EvalError::NoQuery { .. } => ApiError::MethodConflict(err.to_string()),
            EvalError::Cycle { .. } | EvalError::DepthExceeded { .. } => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chill_core::{Method, NodeId, SqlIntent};

    #[test]
    fn storage_errors_map_to_status() {
        let cases = [
            (StorageError::NodeNotFound(NodeId(1)), StatusCode::NOT_FOUND),
            (StorageError::QueryNotFound("q.sql".into()), StatusCode::NOT_FOUND),
            (StorageError::ReadOnly, StatusCode::BAD_REQUEST),
            (
                StorageError::IntentMismatch {
                    method: Method::Get,
                    intent: SqlIntent::Delete,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                StorageError::JournalMode {
                    found: "delete".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn eval_errors_map_to_status() {
        let cycle = EvalError::Cycle {
            node: NodeId(1),
            trail: vec![NodeId(1), NodeId(2)],
        };
        assert_eq!(ApiError::from(cycle).status(), StatusCode::INTERNAL_SERVER_ERROR);

        let missing = EvalError::Template(TemplateError::NotFound("page.html".into()));
        assert_eq!(ApiError::from(missing).status(), StatusCode::NOT_FOUND);

        let no_query = EvalError::NoQuery {
            node: NodeId(3),
            method: Method::Put,
        };
        assert!(matches!(ApiError::from(no_query), ApiError::MethodConflict(_)));
    }

    #[test]
    fn method_parameter_is_a_conflict() {
        let err = CoreError::MethodParameter { source_kind: "query" };
        assert_eq!(ApiError::from(err).status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn error_body_is_json() {
        let response = ApiError::ReadOnly("site is read-only".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "READ_ONLY");
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let response = ApiError::MethodNotAllowed("HEAD".into()).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key(header::ALLOW));
    }
}
