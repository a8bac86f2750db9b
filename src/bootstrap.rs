//! Startup sequence: reflect, register, link, freeze.

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::reflect;
use crate::registry::{RegistryBuilder, ResourceOverrides};
use crate::state::AppState;
use sqlx::PgPool;
use std::collections::HashMap;

/// Build the servable state: reflect the connected schema, derive and
/// register a descriptor per table (applying overrides), link
/// relationships, freeze. Any failure here is fatal: the caller never
/// receives a state backed by a partially-populated registry.
pub async fn bootstrap(
    pool: PgPool,
    config: ApiConfig,
    overrides: &HashMap<String, ResourceOverrides>,
) -> Result<AppState, ApiError> {
    let tables = reflect::reflect_schema(&pool, config.pk_policy).await?;
    let registry = RegistryBuilder::from_tables(&tables, overrides)?.build();
    tracing::info!(resources = registry.len(), "resource registry populated");
    Ok(AppState::new(pool, config, registry))
}

/// Re-reflect the schema and swap the registry wholesale. Requests already
/// in flight keep the snapshot they took; new requests see the new registry
/// only once it is complete.
pub async fn rebuild(
    state: &AppState,
    overrides: &HashMap<String, ResourceOverrides>,
) -> Result<(), ApiError> {
    let tables = reflect::reflect_schema(&state.pool, state.config.pk_policy).await?;
    let registry = RegistryBuilder::from_tables(&tables, overrides)?.build();
    tracing::info!(resources = registry.len(), "resource registry rebuilt");
    state.swap_registry(registry);
    Ok(())
}
