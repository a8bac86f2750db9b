//! Generic CRUD execution against the data store.

mod crud;

pub use crud::{CrudService, Page, Replaced, Upserted};
