//! Typed errors and HTTP mapping.

use crate::operation::Operation;
use crate::response::failure;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("resource '{resource}': unknown operation '{name}'")]
    UnknownOperation { resource: String, name: String },
    #[error("resource '{resource}' field '{field}': unknown type '{name}'")]
    UnknownFieldType {
        resource: String,
        field: String,
        name: String,
    },
    #[error("resource '{resource}': {reason}")]
    InvalidIdentifier { resource: String, reason: String },
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid name for {kind}: '{name}'")]
    InvalidName { kind: &'static str, name: String },
    #[error("duplicate {kind}: '{name}'")]
    Duplicate { kind: &'static str, name: String },
    #[error("service '{service}': unsupported {what} '{value}'")]
    Unsupported {
        service: String,
        what: &'static str,
        value: String,
    },
    #[error("validation: {0}")]
    Validation(String),
    #[error("service '{service}': {source}")]
    Connect {
        service: String,
        #[source]
        source: StoreError,
    },
}

/// Failure reported by a backing store. Never synthesized for "no row".
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("column '{column}': {reason}")]
    Decode { column: String, reason: String },
    #[error("constraint violated on '{table}': {reason}")]
    Constraint { table: String, reason: String },
    #[error("malformed statement: {0}")]
    Malformed(String),
    #[error("statement exceeded deadline of {0:?}")]
    Timeout(std::time::Duration),
}

/// Field-level failure while decoding a request body or a stored record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Closed set of domain failures; each maps to exactly one HTTP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceError {
    ResourceNotFound,
    ResourceFetchFailed,
    ResourceCreationFailed,
    ResourceUpdateFailed,
    ResourceDeletionFailed,
}

impl ServiceError {
    pub fn code(self) -> &'static str {
        match self {
            ServiceError::ResourceNotFound => "resource.not_found",
            ServiceError::ResourceFetchFailed => "resource.fetch_failed",
            ServiceError::ResourceCreationFailed => "resource.creation_failed",
            ServiceError::ResourceUpdateFailed => "resource.update_failed",
            ServiceError::ResourceDeletionFailed => "resource.deletion_failed",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ServiceError::ResourceNotFound => StatusCode::NOT_FOUND,
            ServiceError::ResourceFetchFailed
            | ServiceError::ResourceCreationFailed
            | ServiceError::ResourceUpdateFailed
            | ServiceError::ResourceDeletionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What the usecase layer hands back instead of a record.
#[derive(Error, Debug)]
pub enum UsecaseError {
    #[error("resource not found")]
    NotFound,
    #[error("operation {0} is not bound for this resource")]
    Unbound(Operation),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors leaving a controller; rendered as the failure envelope.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Service {
        kind: ServiceError,
        message: &'static str,
    },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Malformed(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service { kind, .. } => kind.status(),
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Service { kind, .. } => kind.code(),
            ApiError::Validation(_) => "request.validation_failed",
            ApiError::Malformed(_) => "request.malformed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, failure(self.code(), self.to_string())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_the_only_client_error() {
        assert_eq!(ServiceError::ResourceNotFound.status(), StatusCode::NOT_FOUND);
        for kind in [
            ServiceError::ResourceFetchFailed,
            ServiceError::ResourceCreationFailed,
            ServiceError::ResourceUpdateFailed,
            ServiceError::ResourceDeletionFailed,
        ] {
            assert_eq!(kind.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn validation_errors_are_not_404() {
        let e = ApiError::Validation("page: must be at least 1".into());
        assert_eq!(e.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(e.code(), "request.validation_failed");
    }
}
