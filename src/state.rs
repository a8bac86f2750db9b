//! Shared application state for all routes.

use crate::config::ApiConfig;
use crate::registry::ResourceRegistry;
use sqlx::PgPool;
use std::sync::{Arc, RwLock};

/// Cloned into every handler. The registry is behind one extra `Arc` so a
/// rebuild (reconnect, re-reflection) swaps the whole thing atomically:
/// a request clones the inner `Arc` once and sees either the old or the new
/// fully-populated registry, never a mix.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ApiConfig>,
    registry: Arc<RwLock<Arc<ResourceRegistry>>>,
}

impl AppState {
    pub fn new(pool: PgPool, config: ApiConfig, registry: ResourceRegistry) -> Self {
        AppState {
            pool,
            config: Arc::new(config),
            registry: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Snapshot of the current registry.
    pub fn registry(&self) -> Arc<ResourceRegistry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the registry wholesale. Used after re-reflection; in-flight
    /// requests keep the snapshot they already took.
    pub fn swap_registry(&self, registry: ResourceRegistry) {
        let mut guard = self
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(registry);
    }
}
