//! Verb dispatch: every handler follows the same shape. Resolve the
//! collection to a descriptor (404), check the verb is allowed and passes
//! the custom validator (403), perform the data operation, build the
//! negotiated response.

use crate::error::ApiError;
use crate::negotiate::{self, Repr};
use crate::registry::{Method, ResourceDescriptor, ResourceRegistry, ValidationContext};
use crate::render;
use crate::service::{CrudService, Replaced, Upserted};
use crate::sql;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn resolve(
    registry: &ResourceRegistry,
    collection: &str,
) -> Result<Arc<ResourceDescriptor>, ApiError> {
    registry
        .get(collection)
        .cloned()
        .ok_or_else(|| ApiError::UnknownCollection(collection.to_string()))
}

fn ensure_allowed(descriptor: &ResourceDescriptor, method: Method) -> Result<(), ApiError> {
    if descriptor.allows(method) {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed {
            method: method.as_str().to_string(),
            endpoint: descriptor.endpoint.clone(),
            allowed: descriptor.allowed_list(),
        })
    }
}

fn ensure_valid(
    descriptor: &ResourceDescriptor,
    ctx: &ValidationContext<'_>,
) -> Result<(), ApiError> {
    if descriptor.validate(ctx) {
        Ok(())
    } else {
        Err(ApiError::ValidatorRejected {
            method: ctx.method.as_str().to_string(),
            endpoint: descriptor.endpoint.clone(),
        })
    }
}

fn location_uri(state: &AppState, descriptor: &ResourceDescriptor, key: &str) -> String {
    let uri = descriptor.resource_uri(key);
    match &state.config.base_url {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), uri),
        None => uri,
    }
}

/// Build a single-resource response with Link (and optionally Location)
/// headers in the negotiated representation.
fn resource_response(
    status: StatusCode,
    repr: Repr,
    descriptor: &ResourceDescriptor,
    registry: &ResourceRegistry,
    row: &Map<String, Value>,
    expanded: &HashMap<String, Value>,
    location: Option<String>,
) -> Response {
    let links = render::links_for(descriptor, registry, row);
    let mut response = match repr {
        Repr::Json => (
            status,
            Json(render::resource_json(descriptor, registry, row, expanded)),
        )
            .into_response(),
        Repr::Html => (status, Html(render::resource_html(descriptor, row))).into_response(),
    };
    if let Ok(value) = HeaderValue::from_str(&render::link_header(&links)) {
        response.headers_mut().insert(header::LINK, value);
    }
    if let Some(location) = location {
        if let Ok(value) = HeaderValue::from_str(&location) {
            response.headers_mut().insert(header::LOCATION, value);
        }
    }
    response
}

fn as_object(row: Value) -> Map<String, Value> {
    match row {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Fetch the related row behind each set foreign key, one level deep.
async fn expand_related(
    state: &AppState,
    registry: &ResourceRegistry,
    descriptor: &ResourceDescriptor,
    row: &Map<String, Value>,
) -> Result<HashMap<String, Value>, ApiError> {
    let mut out = HashMap::new();
    for fk in &descriptor.foreign_keys {
        let Some(value) = row.get(&fk.column) else { continue };
        if value.is_null() {
            continue;
        }
        let Some(related) = registry.get(&fk.referenced_table) else { continue };
        if let Some(found) = CrudService::find(&state.pool, related, value).await? {
            let nested = as_object(found);
            out.insert(
                fk.column.clone(),
                render::resource_json(related, registry, &nested, &HashMap::new()),
            );
        }
    }
    Ok(out)
}

/// GET /<collection>: filtered, sorted, paginated list. An empty page is
/// still 200.
pub async fn get_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let registry = state.registry();
    let descriptor = resolve(&registry, &collection)?;
    ensure_allowed(&descriptor, Method::Get)?;
    ensure_valid(
        &descriptor,
        &ValidationContext {
            method: Method::Get,
            endpoint: &descriptor.endpoint,
            key: None,
            body: None,
        },
    )?;
    let repr = negotiate::response_format(&headers, false)?;
    let query = sql::parse_list_query(&descriptor, &state.config, &params)?;
    let page = CrudService::list(&state.pool, &descriptor, &query, state.config.case_insensitive)
        .await?;

    Ok(match repr {
        Repr::Json => {
            let resources: Vec<Value> = page
                .rows
                .iter()
                .map(|row| {
                    render::resource_json(
                        &descriptor,
                        &registry,
                        row.as_object().unwrap_or(&Map::new()),
                        &HashMap::new(),
                    )
                })
                .collect();
            Json(render::collection_json(resources, &page)).into_response()
        }
        Repr::Html => Html(render::collection_html(&descriptor, &page.rows)).into_response(),
    })
}

/// GET /<collection>/<key>: one resource; `?expand` nests related rows.
pub async fn get_resource(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let registry = state.registry();
    let descriptor = resolve(&registry, &collection)?;
    ensure_allowed(&descriptor, Method::Get)?;
    ensure_valid(
        &descriptor,
        &ValidationContext {
            method: Method::Get,
            endpoint: &descriptor.endpoint,
            key: Some(&key),
            body: None,
        },
    )?;
    let repr = negotiate::response_format(&headers, false)?;
    let pk = sql::coerce_key(&descriptor, &key)?;
    let row = CrudService::find(&state.pool, &descriptor, &pk)
        .await?
        .ok_or_else(|| ApiError::UnknownResource {
            endpoint: descriptor.endpoint.clone(),
            key: key.clone(),
        })?;
    let row = as_object(row);

    let expanded = if params.iter().any(|(k, _)| k == "expand") {
        expand_related(&state, &registry, &descriptor, &row).await?
    } else {
        HashMap::new()
    };
    Ok(resource_response(
        StatusCode::OK,
        repr,
        &descriptor,
        &registry,
        &row,
        &expanded,
        None,
    ))
}

/// GET /<collection>/<key>/<attribute>: a single column value, or the
/// related resource when the attribute names one.
pub async fn get_attribute(
    State(state): State<AppState>,
    Path((collection, key, attribute)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let registry = state.registry();
    let descriptor = resolve(&registry, &collection)?;
    ensure_allowed(&descriptor, Method::Get)?;
    ensure_valid(
        &descriptor,
        &ValidationContext {
            method: Method::Get,
            endpoint: &descriptor.endpoint,
            key: Some(&key),
            body: None,
        },
    )?;
    let repr = negotiate::response_format(&headers, false)?;
    let pk = sql::coerce_key(&descriptor, &key)?;
    let row = CrudService::find(&state.pool, &descriptor, &pk)
        .await?
        .ok_or_else(|| ApiError::UnknownResource {
            endpoint: descriptor.endpoint.clone(),
            key: key.clone(),
        })?;
    let row = as_object(row);

    if let Some(value) = row.get(&attribute) {
        return Ok(match repr {
            Repr::Json => Json(render::attribute_json(&attribute, value)).into_response(),
            Repr::Html => Html(render::attribute_html(&attribute, value)).into_response(),
        });
    }

    // Not a column: the attribute may name a related resource reached
    // through one of our foreign keys.
    if let Some(related) = registry.get(&attribute) {
        if let Some(fk) = descriptor
            .foreign_keys
            .iter()
            .find(|fk| fk.referenced_table == related.table_name)
        {
            if let Some(value) = row.get(&fk.column).filter(|v| !v.is_null()) {
                if let Some(found) = CrudService::find(&state.pool, related, value).await? {
                    let nested = as_object(found);
                    return Ok(resource_response(
                        StatusCode::OK,
                        repr,
                        related,
                        &registry,
                        &nested,
                        &HashMap::new(),
                        None,
                    ));
                }
            }
        }
    }

    Err(ApiError::UnknownAttribute {
        resource: descriptor.resource_name.clone(),
        attribute,
    })
}

/// POST /<collection>: create from the request body; 201 with Location.
pub async fn post_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let registry = state.registry();
    let descriptor = resolve(&registry, &collection)?;
    ensure_allowed(&descriptor, Method::Post)?;
    let repr = negotiate::response_format(&headers, true)?;
    let fields = negotiate::parse_body(&headers, &body)?;
    ensure_valid(
        &descriptor,
        &ValidationContext {
            method: Method::Post,
            endpoint: &descriptor.endpoint,
            key: None,
            body: Some(&fields),
        },
    )?;
    let row = as_object(CrudService::create(&state.pool, &descriptor, &fields).await?);
    let key = render::key_string(&descriptor, &row);
    let location = location_uri(&state, &descriptor, &key);
    Ok(resource_response(
        StatusCode::CREATED,
        repr,
        &descriptor,
        &registry,
        &row,
        &HashMap::new(),
        Some(location),
    ))
}

/// PATCH /<collection>/<key>: idempotent upsert. Creates with the path key
/// as primary key (201) or merges the provided fields (204).
pub async fn patch_resource(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let registry = state.registry();
    let descriptor = resolve(&registry, &collection)?;
    ensure_allowed(&descriptor, Method::Patch)?;
    let repr = negotiate::response_format(&headers, true)?;
    let fields = negotiate::parse_body(&headers, &body)?;
    ensure_valid(
        &descriptor,
        &ValidationContext {
            method: Method::Patch,
            endpoint: &descriptor.endpoint,
            key: Some(&key),
            body: Some(&fields),
        },
    )?;
    let pk = sql::coerce_key(&descriptor, &key)?;
    match CrudService::upsert(&state.pool, &descriptor, &pk, &fields).await? {
        Upserted::Created(row) => {
            let row = as_object(row);
            let key = render::key_string(&descriptor, &row);
            let location = location_uri(&state, &descriptor, &key);
            Ok(resource_response(
                StatusCode::CREATED,
                repr,
                &descriptor,
                &registry,
                &row,
                &HashMap::new(),
                Some(location),
            ))
        }
        Upserted::Updated => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// PUT /<collection>/<key>: full replace of an existing resource; fields
/// absent from the body are reset to NULL.
pub async fn put_resource(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let registry = state.registry();
    let descriptor = resolve(&registry, &collection)?;
    ensure_allowed(&descriptor, Method::Put)?;
    negotiate::response_format(&headers, true)?;
    let fields = negotiate::parse_body(&headers, &body)?;
    ensure_valid(
        &descriptor,
        &ValidationContext {
            method: Method::Put,
            endpoint: &descriptor.endpoint,
            key: Some(&key),
            body: Some(&fields),
        },
    )?;
    let pk = sql::coerce_key(&descriptor, &key)?;
    match CrudService::replace(&state.pool, &descriptor, &pk, &fields).await? {
        Replaced::Done => Ok(StatusCode::NO_CONTENT.into_response()),
        Replaced::Missing => Err(ApiError::UnknownResource {
            endpoint: descriptor.endpoint.clone(),
            key,
        }),
    }
}

/// DELETE /<collection>/<key>: 204 on success, 404 when absent, 422 when
/// the row is still referenced elsewhere.
pub async fn delete_resource(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let registry = state.registry();
    let descriptor = resolve(&registry, &collection)?;
    ensure_allowed(&descriptor, Method::Delete)?;
    negotiate::response_format(&headers, false)?;
    ensure_valid(
        &descriptor,
        &ValidationContext {
            method: Method::Delete,
            endpoint: &descriptor.endpoint,
            key: Some(&key),
            body: None,
        },
    )?;
    let pk = sql::coerce_key(&descriptor, &key)?;
    if CrudService::delete(&state.pool, &descriptor, &pk).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::UnknownResource {
            endpoint: descriptor.endpoint.clone(),
            key,
        })
    }
}
