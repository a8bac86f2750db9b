//! Registry meta endpoints: the resource index and per-collection
//! meta-descriptions.

use crate::error::ApiError;
use crate::negotiate::{self, Repr};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

/// GET /: how each registered resource can be accessed.
pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let repr = negotiate::response_format(&headers, false)?;
    let registry = state.registry();
    Ok(match repr {
        Repr::Json => {
            let mut body = Map::new();
            for descriptor in registry.all() {
                let mut entry = Map::new();
                entry.insert(
                    "link".into(),
                    Value::String(format!("/{}", descriptor.endpoint)),
                );
                entry.insert(
                    "meta".into(),
                    Value::String(format!("/{}/meta", descriptor.endpoint)),
                );
                body.insert(descriptor.endpoint.clone(), Value::Object(entry));
            }
            Json(Value::Object(body)).into_response()
        }
        Repr::Html => {
            let mut items = String::new();
            for descriptor in registry.all() {
                items.push_str(&format!(
                    "<li><a href=\"/{ep}\">{ep}</a></li>",
                    ep = descriptor.endpoint
                ));
            }
            Html(format!(
                "<!doctype html><html><head><title>resources</title></head>\
                 <body><h1>resources</h1><ul>{}</ul></body></html>",
                items
            ))
            .into_response()
        }
    })
}

/// GET /<collection>/meta: column name to semantic type for one resource.
pub async fn get_meta(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Response, ApiError> {
    let registry = state.registry();
    let descriptor = registry
        .get(&collection)
        .ok_or_else(|| ApiError::UnknownCollection(collection))?;
    Ok(Json(descriptor.meta()).into_response())
}
