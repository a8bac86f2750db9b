//! Content negotiation: representation from Accept, body from Content-Type.

use crate::error::ApiError;
use axum::http::{header, HeaderMap};
use serde_json::{Map, Value};

pub const JSON_CONTENT_TYPES: [&str; 1] = ["application/json"];
pub const HTML_CONTENT_TYPES: [&str; 2] = ["text/html", "application/x-www-form-urlencoded"];

/// Negotiated response representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repr {
    Json,
    Html,
}

/// Decide the response representation from the Accept header. A missing
/// header or a bare `*/*` means JSON. `write` selects the failure status for
/// an unsupported family: writes carry a body whose type must be understood
/// (415), reads only fail to be representable (406).
pub fn response_format(headers: &HeaderMap, write: bool) -> Result<Repr, ApiError> {
    let accept = match headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        None => return Ok(Repr::Json),
        Some(raw) => raw.trim(),
    };
    if accept.is_empty() || accept == "*/*" {
        return Ok(Repr::Json);
    }

    let offered: Vec<&str> = accept
        .split(',')
        .map(|part| part.split(';').next().unwrap_or(part).trim())
        .collect();

    if offered
        .iter()
        .any(|t| HTML_CONTENT_TYPES.contains(t))
    {
        return Ok(Repr::Html);
    }
    if offered
        .iter()
        .any(|t| JSON_CONTENT_TYPES.contains(t) || *t == "*/*" || *t == "application/*")
    {
        return Ok(Repr::Json);
    }

    if write {
        Err(ApiError::UnsupportedMediaType(accept.to_string()))
    } else {
        Err(ApiError::NotAcceptable(accept.to_string()))
    }
}

/// Parse a request body into a field map according to Content-Type. JSON is
/// the default when no Content-Type is sent.
pub fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|raw| raw.split(';').next().unwrap_or(raw).trim().to_string());

    match content_type.as_deref() {
        None | Some("") => parse_json_body(body),
        Some(ct) if JSON_CONTENT_TYPES.contains(&ct) => parse_json_body(body),
        Some(ct) if HTML_CONTENT_TYPES.contains(&ct) => parse_form_body(body),
        Some(ct) => Err(ApiError::UnsupportedMediaType(ct.to_string())),
    }
}

fn parse_json_body(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body is required".into()));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("malformed JSON body: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::BadRequest("body must be a JSON object".into())),
    }
}

fn parse_form_body(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| ApiError::BadRequest(format!("malformed form body: {}", e)))?;
    if pairs.is_empty() {
        return Err(ApiError::BadRequest("request body is required".into()));
    }
    Ok(pairs
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect())
}
