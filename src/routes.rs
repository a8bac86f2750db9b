//! Route table and middleware chain.

use crate::handlers::meta::{get_meta, index};
use crate::handlers::resource::{
    delete_resource, get_attribute, get_collection, get_resource, patch_resource, post_collection,
    put_resource,
};
use crate::middleware;
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Resource and meta routes. Handlers resolve the collection segment
/// against the registry themselves, so one parameterized route serves every
/// reflected table.
pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/:collection", get(get_collection).post(post_collection))
        .route("/:collection/meta", get(get_meta))
        .route(
            "/:collection/:key",
            get(get_resource)
                .patch(patch_resource)
                .put(put_resource)
                .delete(delete_resource),
        )
        .route("/:collection/:key/:attribute", get(get_attribute))
        .with_state(state)
}

/// The full API: resource routes wrapped in the interceptor chain (ETag on
/// GETs, cache suppression on mutations, negotiated error bodies, body
/// size limit, request tracing).
pub fn api_router(state: AppState) -> Router {
    resource_routes(state)
        .layer(axum::middleware::from_fn(middleware::etag))
        .layer(axum::middleware::from_fn(middleware::no_cache_on_mutations))
        .layer(axum::middleware::from_fn(middleware::html_errors))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
}
