use std::fmt;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// A single field that failed the Post contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field failure found while validating one payload.
///
/// Validation never stops at the first problem, so callers get the full list
/// in one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }

    /// Returns true if any failure was recorded against `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Failures of the document store.
///
/// The variants only shape the message; the HTTP layer treats all of them as
/// one internal-error category.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database not connected: {0}")]
    NotConnected(String),

    #[error("Database operation failed: {0}")]
    Backend(String),

    #[error("Malformed document: {0}")]
    Decode(String),
}

/// A configuration variable the process started without.
///
/// Gaps never fail a request; they only show up in the `/test` diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{variable} is not set")]
pub struct ConfigurationGap {
    pub variable: &'static str,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(ref errors) => {
                tracing::debug!("Post validation failed: {}", errors);
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": {
                            "code": "VALIDATION_ERROR",
                            "message": errors.to_string(),
                            "fields": errors.fields(),
                        }
                    }),
                )
            }
            ApiError::BadRequest(ref message) => {
                tracing::debug!("Rejected malformed request: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": {
                            "code": "BAD_REQUEST",
                            "message": message,
                        }
                    }),
                )
            }
            ApiError::Store(ref err) => {
                tracing::error!("Document store error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": {
                            "code": "STORE_ERROR",
                            "message": err.to_string(),
                        }
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// PostgreSQL error mapping
impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.code() {
            Some(code) => {
                tracing::error!("PostgreSQL error: {} (code: {:?})", err, code);
            }
            None => {
                tracing::error!("PostgreSQL error: {}", err);
            }
        }
        StoreError::Backend(err.to_string())
    }
}

// Connection pool error mapping
impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                tracing::warn!("Database connection pool timeout: {}", err);
                StoreError::Backend("Database connection timeout".to_string())
            }
            deadpool_postgres::PoolError::Closed => {
                tracing::error!("Database connection pool is closed: {}", err);
                StoreError::NotConnected("connection pool is closed".to_string())
            }
            _ => {
                tracing::error!("Database connection pool error: {}", err);
                StoreError::Backend(format!("Database connection unavailable: {}", err))
            }
        }
    }
}

// Result type alias for convenience
pub type ApiResult<T> = Result<T, ApiError>;
