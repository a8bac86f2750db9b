//! Generic CRUD execution against PostgreSQL.
//!
//! Every mutation runs in its own transaction: begin, execute, commit. The
//! sqlx transaction rolls back on drop, which covers every early-return
//! path. Constraint violations at the commit boundary are translated to
//! `ApiError::ConstraintViolation` (HTTP 422).

use crate::error::ApiError;
use crate::registry::ResourceDescriptor;
use crate::sql::{
    self, BindValue, ListQuery, QueryBuf,
};
use serde_json::Value;
use sqlx::PgPool;

/// One page of a collection plus the pagination counters for the envelope.
pub struct Page {
    pub rows: Vec<Value>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// Outcome of a PATCH upsert.
pub enum Upserted {
    /// No row existed at the key; one was created (HTTP 201).
    Created(Value),
    /// The existing row was merged (HTTP 204).
    Updated,
}

/// Outcome of a PUT replace.
pub enum Replaced {
    Done,
    /// No row exists at the key; PUT never creates (HTTP 404).
    Missing,
}

pub struct CrudService;

impl CrudService {
    /// Fetch one page of rows matching the parsed collection query.
    pub async fn list(
        pool: &PgPool,
        descriptor: &ResourceDescriptor,
        query: &ListQuery,
        case_insensitive: bool,
    ) -> Result<Page, ApiError> {
        let q = sql::select_page(descriptor, query, case_insensitive);
        let rows = Self::query_many(pool, &q).await?;
        let count_q = sql::count_rows(descriptor, &query.filters, case_insensitive);
        tracing::debug!(sql = %count_q.sql, "query");
        let mut count = sqlx::query_scalar::<_, i64>(&count_q.sql);
        for p in &count_q.params {
            count = count.bind(BindValue::from_json(p));
        }
        let total = count.fetch_one(pool).await?;
        Ok(Page {
            rows,
            page: query.page,
            per_page: query.per_page,
            total: total.max(0) as u64,
        })
    }

    /// Fetch one row by primary key.
    pub async fn find(
        pool: &PgPool,
        descriptor: &ResourceDescriptor,
        key: &Value,
    ) -> Result<Option<Value>, ApiError> {
        let q = sql::select_by_pk(descriptor, key);
        Self::query_one(pool, &q).await
    }

    /// Insert a new row from the body, returning the created row.
    pub async fn create(
        pool: &PgPool,
        descriptor: &ResourceDescriptor,
        body: &serde_json::Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let q = sql::insert(descriptor, body, None);
        let mut tx = pool.begin().await?;
        let row = Self::query_one_tx(&mut tx, &q)
            .await?
            .ok_or(ApiError::Db(sqlx::Error::RowNotFound))?;
        tx.commit().await.map_err(ApiError::from_write_error)?;
        Ok(row)
    }

    /// PATCH semantics: create the row with the path key as its primary key
    /// when absent, merge only the provided fields when present.
    pub async fn upsert(
        pool: &PgPool,
        descriptor: &ResourceDescriptor,
        key: &Value,
        body: &serde_json::Map<String, Value>,
    ) -> Result<Upserted, ApiError> {
        let mut tx = pool.begin().await?;
        let existing = Self::query_one_tx(&mut tx, &sql::select_by_pk(descriptor, key)).await?;
        let outcome = match existing {
            None => {
                let q = sql::insert(descriptor, body, Some(key));
                let row = Self::query_one_tx(&mut tx, &q)
                    .await?
                    .ok_or(ApiError::Db(sqlx::Error::RowNotFound))?;
                Upserted::Created(row)
            }
            Some(_) => {
                if let Some(q) = sql::update_merge(descriptor, key, body) {
                    Self::query_one_tx(&mut tx, &q).await?;
                }
                Upserted::Updated
            }
        };
        tx.commit().await.map_err(ApiError::from_write_error)?;
        Ok(outcome)
    }

    /// PUT semantics: overwrite every column of an existing row, absent
    /// fields become NULL. The row must already exist.
    pub async fn replace(
        pool: &PgPool,
        descriptor: &ResourceDescriptor,
        key: &Value,
        body: &serde_json::Map<String, Value>,
    ) -> Result<Replaced, ApiError> {
        let q = sql::replace_full(descriptor, key, body);
        let mut tx = pool.begin().await?;
        let row = Self::query_one_tx(&mut tx, &q).await?;
        if row.is_none() {
            return Ok(Replaced::Missing);
        }
        tx.commit().await.map_err(ApiError::from_write_error)?;
        Ok(Replaced::Done)
    }

    /// Delete one row by primary key; false when no row existed.
    pub async fn delete(
        pool: &PgPool,
        descriptor: &ResourceDescriptor,
        key: &Value,
    ) -> Result<bool, ApiError> {
        let q = sql::delete_by_pk(descriptor, key);
        let mut tx = pool.begin().await?;
        let deleted = Self::query_one_tx(&mut tx, &q).await?.is_some();
        tx.commit().await.map_err(ApiError::from_write_error)?;
        Ok(deleted)
    }

    async fn query_many(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(BindValue::from_json(p));
        }
        let rows = query.fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn query_one(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(BindValue::from_json(p));
        }
        let row = query.fetch_optional(pool).await?;
        Ok(row.as_ref().map(row_to_json))
    }

    async fn query_one_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        q: &QueryBuf,
    ) -> Result<Option<Value>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(BindValue::from_json(p));
        }
        let row = query
            .fetch_optional(&mut **tx)
            .await
            .map_err(ApiError::from_write_error)?;
        Ok(row.as_ref().map(row_to_json))
    }
}

/// Decode a database row into a JSON object, one field per column.
pub fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
