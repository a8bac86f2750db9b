//! Query-string filtering: `column[__operator]=value` with typed coercion.

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::reflect::{ColumnSchema, ColumnType};
use crate::registry::ResourceDescriptor;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Like,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(FilterOp::Eq),
            "like" => Some(FilterOp::Like),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Like => "LIKE",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Parsed collection query: filters plus sorting and pagination.
#[derive(Clone, Debug)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

/// Parse raw query parameters against a descriptor. Unknown columns and
/// unknown operators are rejected (HTTP 422); reserved names are handled as
/// pagination/sorting controls.
pub fn parse_list_query(
    descriptor: &ResourceDescriptor,
    config: &ApiConfig,
    params: &[(String, String)],
) -> Result<ListQuery, ApiError> {
    let mut filters = Vec::new();
    let mut sort = None;
    let mut page: u32 = 1;
    let mut per_page: Option<u32> = None;

    for (key, raw) in params {
        match key.as_str() {
            "page" => {
                page = raw
                    .parse::<u32>()
                    .ok()
                    .filter(|p| *p >= 1)
                    .ok_or_else(|| ApiError::InvalidFilter(format!("invalid page '{}'", raw)))?;
            }
            "per_page" => {
                per_page = Some(raw.parse::<u32>().map_err(|_| {
                    ApiError::InvalidFilter(format!("invalid per_page '{}'", raw))
                })?);
            }
            "sort" => {
                if !descriptor.is_column(raw) {
                    return Err(ApiError::InvalidFilter(format!(
                        "unknown sort column '{}'",
                        raw
                    )));
                }
                sort = Some(raw.clone());
            }
            _ => filters.push(parse_filter(descriptor, key, raw)?),
        }
    }

    Ok(ListQuery {
        filters,
        sort,
        page,
        per_page: config.clamp_per_page(per_page),
    })
}

/// Parse a single `column[__operator]=value` pair. A leading `%` in the
/// value of a plain equality filter promotes it to a wildcard match.
pub fn parse_filter(
    descriptor: &ResourceDescriptor,
    key: &str,
    raw: &str,
) -> Result<Filter, ApiError> {
    let mut parts = key.splitn(2, "__");
    let column_name = parts.next().unwrap_or(key);
    let op = match parts.next() {
        None => FilterOp::Eq,
        Some(op_name) => FilterOp::parse(op_name)
            .ok_or_else(|| ApiError::InvalidFilter(format!("unknown operator '{}'", op_name)))?,
    };

    let column = descriptor
        .column(column_name)
        .ok_or_else(|| ApiError::InvalidFilter(format!("unknown column '{}'", column_name)))?;

    let op = if op == FilterOp::Eq && raw.starts_with('%') {
        FilterOp::Like
    } else {
        op
    };

    if op == FilterOp::Like && !column.ty.is_text() {
        return Err(ApiError::InvalidFilter(format!(
            "wildcard match requires a text column, '{}' is {}",
            column.name,
            column.ty.as_str()
        )));
    }

    let value = if op == FilterOp::Like {
        Value::String(raw.to_string())
    } else {
        coerce_for_column(column, raw)?
    };

    Ok(Filter {
        column: column.name.clone(),
        op,
        value,
    })
}

/// Coerce a raw query/path string to a JSON value matching the column's
/// semantic type. Values the column can never hold are rejected.
pub fn coerce_for_column(column: &ColumnSchema, raw: &str) -> Result<Value, ApiError> {
    let invalid = || {
        ApiError::InvalidFilter(format!(
            "value '{}' is not valid for {} column '{}'",
            raw,
            column.ty.as_str(),
            column.name
        ))
    };
    match &column.ty {
        ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt => raw
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid()),
        ColumnType::Real | ColumnType::Double => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        ColumnType::Decimal => {
            // Bound as text and cast to numeric in SQL; validate digits here.
            raw.parse::<f64>().map_err(|_| invalid())?;
            Ok(Value::String(raw.to_string()))
        }
        ColumnType::Boolean => match raw {
            _ if raw.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            _ if raw.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        ColumnType::Uuid => {
            uuid::Uuid::parse_str(raw).map_err(|_| invalid())?;
            Ok(Value::String(raw.to_string()))
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Coerce a path key to the primary-key column's type. A key that cannot be
/// the type of the primary key matches no row, so the miss is reported as an
/// unknown resource rather than a malformed request.
pub fn coerce_key(descriptor: &ResourceDescriptor, raw: &str) -> Result<Value, ApiError> {
    coerce_for_column(descriptor.pk_column(), raw).map_err(|_| ApiError::UnknownResource {
        endpoint: descriptor.endpoint.clone(),
        key: raw.to_string(),
    })
}
