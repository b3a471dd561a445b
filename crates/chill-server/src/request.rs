//! Request parameter collection.
//!
//! Parameters are gathered per source and layered by
//! [`chill_core::RequestParams`]: path < JSON body < form < query string <
//! cookies, with the computed `method` on top.

use axum::http::{header, HeaderMap, Uri};

use chill_core::{ParamSource, RequestParams, Value};

use crate::error::ApiError;

/// Collects body, query-string and cookie parameters. Path parameters are
/// added once the Route is resolved.
pub fn collect_params(uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Result<RequestParams, ApiError> {
    let mut params = RequestParams::new();

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !body.is_empty() {
        if content_type.starts_with("application/json") {
            params = params.with(ParamSource::Json, json_entries(body)?);
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
                .map_err(|e| ApiError::BadRequest(format!("invalid form body: {}", e)))?;
            params = params.with(ParamSource::Form, text_entries(pairs));
        }
    }

    if let Some(query) = uri.query() {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| ApiError::BadRequest(format!("invalid query string: {}", e)))?;
        params = params.with(ParamSource::Query, text_entries(pairs));
    }

    Ok(params.with(ParamSource::Cookie, text_entries(cookies(headers))))
}

fn json_entries(body: &[u8]) -> Result<Vec<(String, Value)>, ApiError> {
    let json: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?;
    match json {
        serde_json::Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        _ => Err(ApiError::BadRequest("JSON body must be an object".to_string())),
    }
}

fn text_entries(pairs: Vec<(String, String)>) -> impl Iterator<Item = (String, Value)> {
    pairs.into_iter().map(|(k, v)| (k, Value::Text(v)))
}

fn cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}
