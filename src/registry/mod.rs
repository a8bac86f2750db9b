//! Resource registry: the process-wide mapping from endpoint, table, and
//! resource type names to descriptors.
//!
//! The registry has a two-phase life: a mutable `RegistryBuilder` collects
//! descriptors (boot or rebuild), then `build()` runs the relationship
//! linker and freezes the result. Request handlers only ever see the frozen
//! `ResourceRegistry`, so no locking is needed on the read path.

pub mod descriptor;
pub mod linker;

pub use descriptor::{
    Method, MethodValidator, ResourceDescriptor, ResourceOverrides, ValidationContext,
};

use crate::error::RegistryError;
use crate::reflect::TableSchema;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct RegistryBuilder {
    descriptors: Vec<ResourceDescriptor>,
    by_endpoint: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive and register a descriptor for every reflected table, applying
    /// any per-table overrides (keyed by table name).
    pub fn from_tables(
        tables: &[TableSchema],
        overrides: &HashMap<String, ResourceOverrides>,
    ) -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        for table in tables {
            let descriptor = ResourceDescriptor::from_table(table, overrides.get(&table.name));
            builder.register(descriptor)?;
        }
        Ok(builder)
    }

    /// Insert or replace a descriptor under its endpoint name. Replacing is
    /// only allowed for a descriptor of the same shape (idempotent
    /// re-registration, possibly with fresh validators); a *different*
    /// descriptor claiming a taken endpoint is a conflict, never a silent
    /// overwrite.
    pub fn register(&mut self, descriptor: ResourceDescriptor) -> Result<(), RegistryError> {
        if let Some(&idx) = self.by_endpoint.get(&descriptor.endpoint) {
            if self.descriptors[idx].same_shape(&descriptor) {
                self.descriptors[idx] = descriptor;
                return Ok(());
            }
            return Err(RegistryError::EndpointConflict(descriptor.endpoint));
        }
        self.by_endpoint
            .insert(descriptor.endpoint.clone(), self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Link relationships and freeze. After this point the registry is
    /// read-only; rebuilding means constructing a new builder and swapping
    /// the whole registry.
    pub fn build(mut self) -> ResourceRegistry {
        linker::link(&mut self.descriptors);
        let descriptors: Vec<Arc<ResourceDescriptor>> =
            self.descriptors.into_iter().map(Arc::new).collect();
        let mut index = HashMap::new();
        // Register each descriptor under all three of its names, endpoint
        // first so it wins any overlap with another resource's table name.
        for (i, d) in descriptors.iter().enumerate() {
            index.entry(d.endpoint.clone()).or_insert(i);
        }
        for (i, d) in descriptors.iter().enumerate() {
            index.entry(d.table_name.clone()).or_insert(i);
            index.entry(d.resource_name.clone()).or_insert(i);
        }
        ResourceRegistry { descriptors, index }
    }
}

/// Immutable, fully-linked registry. Shared across request tasks behind an
/// `Arc`; see `AppState` for the swap discipline.
pub struct ResourceRegistry {
    descriptors: Vec<Arc<ResourceDescriptor>>,
    index: HashMap<String, usize>,
}

impl ResourceRegistry {
    /// Look up a descriptor by endpoint name (or table/resource name; all
    /// three are registered). This is the miss that surfaces as HTTP 404
    /// for unknown collections.
    pub fn lookup(&self, name: &str) -> Result<&Arc<ResourceDescriptor>, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.descriptors[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ResourceDescriptor>> {
        self.index.get(name).map(|&i| &self.descriptors[i])
    }

    /// All descriptors in declaration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<ResourceDescriptor>> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
