//! Resource descriptor: one table's mapping to the API.
//!
//! Everything downstream of reflection (dispatch, SQL building, rendering)
//! operates on descriptors, never on raw catalog rows.

use crate::naming;
use crate::reflect::{ColumnSchema, ForeignKey, TableSchema};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// HTTP verbs a resource can allow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Patch,
        Method::Put,
        Method::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request context handed to a custom validator before a verb executes.
pub struct ValidationContext<'a> {
    pub method: Method,
    pub endpoint: &'a str,
    pub key: Option<&'a str>,
    pub body: Option<&'a serde_json::Map<String, Value>>,
}

/// Per-method veto hook; returning false rejects the request with 403.
pub type MethodValidator = Arc<dyn Fn(&ValidationContext<'_>) -> bool + Send + Sync>;

/// Explicit per-table overrides applied when a descriptor is derived.
#[derive(Clone, Default)]
pub struct ResourceOverrides {
    pub endpoint: Option<String>,
    pub methods: Option<BTreeSet<Method>>,
    pub validators: HashMap<Method, MethodValidator>,
}

#[derive(Clone)]
pub struct ResourceDescriptor {
    /// Source table identifier; set at derivation, never changed.
    pub table_name: String,
    /// Type name exposed in meta output (CamelCase of the table name).
    pub resource_name: String,
    /// URL path segment; unique across the registry.
    pub endpoint: String,
    /// The single column used as the API key. For composite reflected keys
    /// this is the first constraint column.
    pub primary_key: String,
    pub allowed_methods: BTreeSet<Method>,
    /// Ordinal column list; the explicit field set every accessor indexes
    /// into instead of reflecting attribute names at runtime.
    pub columns: Vec<ColumnSchema>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Endpoints reachable via a foreign key, in either direction. Populated
    /// by the relationship linker; symmetric across the registry.
    pub related: BTreeSet<String>,
    pub validators: HashMap<Method, MethodValidator>,
}

impl ResourceDescriptor {
    /// Derive a descriptor from a reflected table. The table must carry a
    /// primary key; reflection enforces that before descriptors are built.
    pub fn from_table(table: &TableSchema, overrides: Option<&ResourceOverrides>) -> Self {
        let endpoint = overrides
            .and_then(|o| o.endpoint.clone())
            .unwrap_or_else(|| naming::endpoint_for_table(&table.name));
        let allowed_methods = overrides
            .and_then(|o| o.methods.clone())
            .unwrap_or_else(|| Method::ALL.into_iter().collect());
        let validators = overrides.map(|o| o.validators.clone()).unwrap_or_default();
        ResourceDescriptor {
            table_name: table.name.clone(),
            resource_name: naming::resource_name_for_table(&table.name),
            endpoint,
            primary_key: table.primary_key[0].clone(),
            allowed_methods,
            columns: table.columns.clone(),
            foreign_keys: table.foreign_keys.clone(),
            related: BTreeSet::new(),
            validators,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn pk_column(&self) -> &ColumnSchema {
        self.column(&self.primary_key)
            .unwrap_or(&self.columns[0])
    }

    pub fn fk_for_column(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.column == name)
    }

    /// Canonical URI for the resource instance with the given key.
    pub fn resource_uri(&self, key: &str) -> String {
        format!("/{}/{}", self.endpoint, key)
    }

    pub fn allows(&self, method: Method) -> bool {
        self.allowed_methods.contains(&method)
    }

    /// Comma-joined allowed methods, used in 403 messages.
    pub fn allowed_list(&self) -> String {
        self.allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Run the custom validator for *method*, if any. No validator means the
    /// request is acceptable.
    pub fn validate(&self, ctx: &ValidationContext<'_>) -> bool {
        match self.validators.get(&ctx.method) {
            Some(validator) => validator(ctx),
            None => true,
        }
    }

    /// Structural equality ignoring validators and linker output. Used to
    /// make re-registration of the same resource a no-op.
    pub fn same_shape(&self, other: &ResourceDescriptor) -> bool {
        self.table_name == other.table_name
            && self.resource_name == other.resource_name
            && self.endpoint == other.endpoint
            && self.primary_key == other.primary_key
            && self.allowed_methods == other.allowed_methods
            && self.columns == other.columns
            && self.foreign_keys == other.foreign_keys
    }

    /// Meta-description: column name -> semantic type, keyed by the resource
    /// type name.
    pub fn meta(&self) -> Value {
        let mut attributes = serde_json::Map::new();
        for c in &self.columns {
            attributes.insert(c.name.clone(), Value::String(c.ty.as_str().to_string()));
        }
        let mut out = serde_json::Map::new();
        out.insert(self.resource_name.clone(), Value::Object(attributes));
        Value::Object(out)
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("table_name", &self.table_name)
            .field("resource_name", &self.resource_name)
            .field("endpoint", &self.endpoint)
            .field("primary_key", &self.primary_key)
            .field("allowed_methods", &self.allowed_methods)
            .field("columns", &self.columns.len())
            .field("foreign_keys", &self.foreign_keys)
            .field("related", &self.related)
            .field("validators", &self.validators.len())
            .finish()
    }
}
