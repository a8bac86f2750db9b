//! Request interceptors composed at router setup, outside the dispatch
//! logic: negotiated error bodies, conditional GETs, cache suppression.

use crate::negotiate::HTML_CONTENT_TYPES;
use crate::render;
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use sha2::{Digest, Sha256};

const ERROR_BODY_LIMIT: usize = 64 * 1024;

fn accepts_html(req: &Request) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| {
            accept
                .split(',')
                .map(|part| part.split(';').next().unwrap_or(part).trim())
                .any(|t| HTML_CONTENT_TYPES.contains(&t))
        })
        .unwrap_or(false)
}

/// Re-render JSON error bodies as HTML pages for clients that negotiated
/// HTML. Success responses and JSON clients pass through untouched.
pub async fn html_errors(req: Request, next: Next) -> Response {
    let wants_html = accepts_html(&req);
    let response = next.run(req).await;
    if !wants_html || !(response.status().is_client_error() || response.status().is_server_error())
    {
        return response;
    }
    let status = response.status();
    let (parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, ERROR_BODY_LIMIT).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let message = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| status.to_string());
    (
        status,
        axum::response::Html(render::error_html(status.as_u16(), &message)),
    )
        .into_response()
}

/// Mutating responses must never be cached.
pub async fn no_cache_on_mutations(req: Request, next: Next) -> Response {
    let mutating = matches!(
        *req.method(),
        Method::POST | Method::PATCH | Method::PUT | Method::DELETE
    );
    let mut response = next.run(req).await;
    if mutating {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, max-age=0"),
        );
    }
    response
}

fn not_modified() -> Response {
    (
        StatusCode::NOT_MODIFIED,
        Json(serde_json::json!({"status": 304, "error": "not modified"})),
    )
        .into_response()
}

fn precondition_failed() -> Response {
    (
        StatusCode::PRECONDITION_FAILED,
        Json(serde_json::json!({"status": 412, "error": "precondition failed"})),
    )
        .into_response()
}

/// Content-hash ETags on successful GETs, honoring If-Match and
/// If-None-Match.
pub async fn etag(req: Request, next: Next) -> Response {
    if *req.method() != Method::GET {
        return next.run(req).await;
    }
    let if_match = req
        .headers()
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let if_none_match = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }
    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, usize::MAX).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let tag = format!("\"{}\"", hex::encode(Sha256::digest(&bytes)));
    if let Ok(value) = HeaderValue::from_str(&tag) {
        parts.headers.insert(header::ETAG, value);
    }

    if let Some(if_match) = if_match {
        let tags: Vec<&str> = if_match.split(',').map(str::trim).collect();
        if !tags.contains(&tag.as_str()) && !tags.contains(&"*") {
            return precondition_failed();
        }
    } else if let Some(if_none_match) = if_none_match {
        let tags: Vec<&str> = if_none_match.split(',').map(str::trim).collect();
        if tags.contains(&tag.as_str()) || tags.contains(&"*") {
            return not_modified();
        }
    }
    Response::from_parts(parts, Body::from(bytes))
}
