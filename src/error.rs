//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while reflecting the database schema. All of these are
/// startup errors: they prevent the registry from being populated and the
/// process must not begin serving.
#[derive(Error, Debug)]
pub enum ReflectError {
    #[error("table '{0}' has no primary key and no synthesis policy is configured")]
    MissingPrimaryKey(String),
    #[error("schema introspection: {0}")]
    Introspection(#[from] sqlx::Error),
}

/// Errors raised while building the resource registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("endpoint '{0}' is already claimed by a different resource")]
    EndpointConflict(String),
    #[error("no resource registered for endpoint '{0}'")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Reflect(#[from] ReflectError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("no such collection: {0}")]
    UnknownCollection(String),
    #[error("no resource with key '{key}' in collection '{endpoint}'")]
    UnknownResource { endpoint: String, key: String },
    #[error("no attribute '{attribute}' on resource type '{resource}'")]
    UnknownAttribute { resource: String, attribute: String },
    #[error("method [{method}] not acceptable for resource type [{endpoint}]; acceptable methods: [{allowed}]")]
    MethodNotAllowed {
        method: String,
        endpoint: String,
        allowed: String,
    },
    #[error("request rejected by {method} validator for resource type [{endpoint}]")]
    ValidatorRejected { method: String, endpoint: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("content-type [{0}] not supported")]
    UnsupportedMediaType(String),
    #[error("accept type [{0}] not supported")]
    NotAcceptable(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("request could not be completed; exception: [{0}]")]
    ConstraintViolation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Reflect(_) | ApiError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UnknownCollection(_)
            | ApiError::UnknownResource { .. }
            | ApiError::UnknownAttribute { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } | ApiError::ValidatorRejected { .. } => {
                StatusCode::FORBIDDEN
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            ApiError::InvalidFilter(_) | ApiError::ConstraintViolation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Db(e) => match e {
                sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// True when the underlying database error is an integrity-constraint
    /// violation (SQLSTATE class 23). Checked at the commit boundary so a
    /// failed write surfaces as 422 instead of 500.
    pub fn is_constraint_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => db
                .code()
                .map(|c| c.as_ref().starts_with("23"))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Translate a database error from a write path: constraint violations
    /// become 422 with the cause forwarded, everything else passes through.
    pub fn from_write_error(err: sqlx::Error) -> Self {
        if Self::is_constraint_violation(&err) {
            let cause = match &err {
                sqlx::Error::Database(db) => db.message().to_string(),
                _ => err.to_string(),
            };
            ApiError::ConstraintViolation(cause)
        } else {
            ApiError::Db(err)
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::UnknownCollection("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::MethodNotAllowed {
                method: "POST".into(),
                endpoint: "artists".into(),
                allowed: "GET".into(),
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::BadRequest("no body".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::UnsupportedMediaType("application/xml".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ApiError::NotAcceptable("application/xml".into()).status(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            ApiError::InvalidFilter("bogus".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::ConstraintViolation("fk".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Db(sqlx::Error::RowNotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn method_not_allowed_message_names_allowed_methods() {
        let err = ApiError::MethodNotAllowed {
            method: "DELETE".into(),
            endpoint: "artists".into(),
            allowed: "GET, POST".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DELETE"));
        assert!(msg.contains("GET, POST"));
    }
}
