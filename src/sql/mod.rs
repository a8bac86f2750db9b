//! Safe SQL construction: identifiers come from reflected descriptors only,
//! values are always bound as parameters.

pub mod builder;
pub mod filter;
pub mod params;

pub use builder::{
    count_rows, delete_by_pk, insert, replace_full, select_by_pk, select_page, update_merge,
    QueryBuf,
};
pub use filter::{coerce_key, parse_list_query, Filter, FilterOp, ListQuery};
pub use params::BindValue;
