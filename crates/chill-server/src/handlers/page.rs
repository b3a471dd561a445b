//! The catch-all page handler.

use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use chill_core::{Method, Value};

use crate::error::ApiError;
use crate::request::collect_params;
use crate::service::{PageOutcome, PageRequest};
use crate::state::AppState;

const HTML: &str = "text/html; charset=utf-8";
const JSON: &str = "application/json";

/// Dispatches any path and verb to the page pipeline.
pub async fn dispatch(
    State(state): State<AppState>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let method = Method::from_str(method.as_str())?;
    let params = collect_params(&uri, &headers, &body)?;
    let request = PageRequest {
        method,
        path: uri.path().to_string(),
        params,
    };

    let service = state.service.clone();
    let outcome = tokio::task::spawn_blocking(move || service.handle(request))
        .await
        .map_err(|e| ApiError::InternalError(format!("request task failed: {}", e)))??;

    Ok(respond(method, outcome, &headers))
}

fn respond(method: Method, outcome: PageOutcome, headers: &HeaderMap) -> Response {
    let value = match outcome {
        PageOutcome::Created => return (StatusCode::CREATED, "ok").into_response(),
        PageOutcome::Deleted => return StatusCode::NO_CONTENT.into_response(),
        PageOutcome::Content(value) => value,
    };

    let (content_type, body) = render_body(&value);
    if method != Method::Get {
        return (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response();
    }

    let etag = format!("\"{}\"", blake3::hash(body.as_bytes()).to_hex());
    if matches_etag(headers, &etag) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::ETAG, etag),
        ],
        body,
    )
        .into_response()
}

/// Scalars are sent raw as HTML; everything else as JSON.
fn render_body(value: &Value) -> (&'static str, String) {
    if value.is_scalar() {
        (HTML, value.to_string())
    } else {
        (JSON, value.to_json().to_string())
    }
}

fn matches_etag(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(','))
        .map(|candidate| candidate.trim().trim_start_matches("W/"))
        .any(|candidate| candidate == "*" || candidate == etag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chill_core::Params;

    #[test]
    fn scalars_render_raw() {
        assert_eq!(render_body(&Value::Text("hi".into())), (HTML, "hi".to_string()));
        assert_eq!(render_body(&Value::Integer(3)), (HTML, "3".to_string()));
    }

    #[test]
    fn structures_render_as_json() {
        let mut map = Params::new();
        map.insert("a".into(), Value::Integer(1));
        assert_eq!(render_body(&Value::Map(map)), (JSON, r#"{"a":1}"#.to_string()));
    }

    #[test]
    fn etag_matching_handles_lists_and_weak_tags() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_static(r#""other", W/"abc""#),
        );
        assert!(matches_etag(&headers, r#""abc""#));
        assert!(!matches_etag(&headers, r#""xyz""#));
        assert!(!matches_etag(&HeaderMap::new(), r#""abc""#));
    }
}
