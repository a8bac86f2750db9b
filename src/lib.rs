//! restable: database-reflected REST API backend library.
//!
//! Point it at an existing PostgreSQL database and every table becomes a
//! REST collection: reflection derives a descriptor per table at startup
//! (endpoint name, primary key, allowed methods, foreign-key relations),
//! and one set of generic handlers dispatches GET/POST/PATCH/PUT/DELETE
//! against the registry with content negotiation and pagination.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod naming;
pub mod negotiate;
pub mod reflect;
pub mod registry;
pub mod render;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use bootstrap::{bootstrap, rebuild};
pub use config::ApiConfig;
pub use error::{ApiError, ReflectError, RegistryError};
pub use reflect::{reflect_schema, PkPolicy, TableSchema};
pub use registry::{
    Method, RegistryBuilder, ResourceDescriptor, ResourceOverrides, ResourceRegistry,
};
pub use routes::{api_router, resource_routes};
pub use service::CrudService;
pub use state::AppState;
