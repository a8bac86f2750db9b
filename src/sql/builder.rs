//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a descriptor.

use crate::registry::ResourceDescriptor;
use crate::sql::filter::{Filter, FilterOp, ListQuery};
use serde_json::{Map, Value};

/// Quote an identifier for PostgreSQL (identifiers only ever come from
/// reflected schema, never from the request).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// SELECT list: each column as-is, except types that must round-trip as
/// exact strings (numeric) which are cast to text.
fn select_column_list(descriptor: &ResourceDescriptor) -> String {
    descriptor
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if c.ty.select_as_text() {
                format!("{}::text", q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bind placeholder for one column, with a SQL cast for string-bound types.
fn placeholder(q: &mut QueryBuf, descriptor: &ResourceDescriptor, column: &str, v: Value) -> String {
    let n = q.push_param(v);
    match descriptor.column(column).and_then(|c| c.ty.bind_cast()) {
        Some(cast) => format!("${}::{}", n, cast),
        None => format!("${}", n),
    }
}

fn where_clause(
    q: &mut QueryBuf,
    descriptor: &ResourceDescriptor,
    filters: &[Filter],
    case_insensitive: bool,
) -> String {
    let mut parts = Vec::with_capacity(filters.len());
    for f in filters {
        let col = quoted(&f.column);
        let is_text = descriptor
            .column(&f.column)
            .map(|c| c.ty.is_text())
            .unwrap_or(false);
        let ph = placeholder(q, descriptor, &f.column, f.value.clone());
        let part = match f.op {
            FilterOp::Eq if case_insensitive && is_text => {
                format!("upper({}) = upper({})", col, ph)
            }
            FilterOp::Like if case_insensitive => format!("{} ILIKE {}", col, ph),
            FilterOp::Like => format!("{} LIKE {}", col, ph),
            op => format!("{} {} {}", col, op.sql(), ph),
        };
        parts.push(part);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// One page of a collection: filters, ORDER BY the sort column or the
/// primary key, LIMIT/OFFSET from the page number.
pub fn select_page(
    descriptor: &ResourceDescriptor,
    query: &ListQuery,
    case_insensitive: bool,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = select_column_list(descriptor);
    let table = quoted(&descriptor.table_name);
    let where_part = where_clause(&mut q, descriptor, &query.filters, case_insensitive);
    let order = quoted(query.sort.as_deref().unwrap_or(&descriptor.primary_key));
    let offset = u64::from(query.page - 1) * u64::from(query.per_page);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        cols, table, where_part, order, query.per_page, offset
    );
    q
}

/// Total row count for the same filters, for the pagination envelope.
pub fn count_rows(
    descriptor: &ResourceDescriptor,
    filters: &[Filter],
    case_insensitive: bool,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&descriptor.table_name);
    let where_part = where_clause(&mut q, descriptor, filters, case_insensitive);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", table, where_part);
    q
}

/// SELECT one row by primary key.
pub fn select_by_pk(descriptor: &ResourceDescriptor, key: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = select_column_list(descriptor);
    let table = quoted(&descriptor.table_name);
    let pk = quoted(&descriptor.primary_key);
    let ph = placeholder(&mut q, descriptor, &descriptor.primary_key, key.clone());
    q.sql = format!("SELECT {} FROM {} WHERE {} = {}", cols, table, pk, ph);
    q
}

/// INSERT from a body map. Only known columns are bound; columns absent from
/// the body are omitted so database defaults apply. When `pk_value` is given
/// (PATCH-create) it wins over anything in the body.
pub fn insert(
    descriptor: &ResourceDescriptor,
    body: &Map<String, Value>,
    pk_value: Option<&Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&descriptor.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &descriptor.columns {
        let value = if c.name == descriptor.primary_key {
            pk_value.cloned().or_else(|| body.get(&c.name).cloned())
        } else {
            body.get(&c.name).cloned()
        };
        let Some(value) = value else { continue };
        let ph = placeholder(&mut q, descriptor, &c.name, value);
        cols.push(quoted(&c.name));
        placeholders.push(ph);
    }
    let returning = select_column_list(descriptor);
    if cols.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning);
    } else {
        q.sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        );
    }
    q
}

/// UPDATE merging only the columns present in the body (PATCH). Returns None
/// when the body carries no settable column, which the caller treats as a
/// fetch-only no-op.
pub fn update_merge(
    descriptor: &ResourceDescriptor,
    key: &Value,
    body: &Map<String, Value>,
) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = quoted(&descriptor.table_name);
    let mut sets = Vec::new();
    for c in &descriptor.columns {
        if c.name == descriptor.primary_key {
            continue;
        }
        if let Some(v) = body.get(&c.name) {
            let ph = placeholder(&mut q, descriptor, &c.name, v.clone());
            sets.push(format!("{} = {}", quoted(&c.name), ph));
        }
    }
    if sets.is_empty() {
        return None;
    }
    let pk = quoted(&descriptor.primary_key);
    let key_ph = placeholder(&mut q, descriptor, &descriptor.primary_key, key.clone());
    let returning = select_column_list(descriptor);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets.join(", "),
        pk,
        key_ph,
        returning
    );
    Some(q)
}

/// UPDATE overwriting every non-key column (PUT): columns absent from the
/// body are reset to NULL, not left unchanged.
pub fn replace_full(
    descriptor: &ResourceDescriptor,
    key: &Value,
    body: &Map<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&descriptor.table_name);
    let mut sets = Vec::new();
    for c in &descriptor.columns {
        if c.name == descriptor.primary_key {
            continue;
        }
        let value = body.get(&c.name).cloned().unwrap_or(Value::Null);
        let ph = placeholder(&mut q, descriptor, &c.name, value);
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    let pk = quoted(&descriptor.primary_key);
    let key_ph = placeholder(&mut q, descriptor, &descriptor.primary_key, key.clone());
    let returning = select_column_list(descriptor);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets.join(", "),
        pk,
        key_ph,
        returning
    );
    q
}

/// DELETE one row by primary key, returning the key when a row was removed.
pub fn delete_by_pk(descriptor: &ResourceDescriptor, key: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&descriptor.table_name);
    let pk = quoted(&descriptor.primary_key);
    let ph = placeholder(&mut q, descriptor, &descriptor.primary_key, key.clone());
    q.sql = format!("DELETE FROM {} WHERE {} = {} RETURNING {}", table, pk, ph, pk);
    q
}
