//! Custom error types for the API service

use auth::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    AlreadyExists(String),

    /// The entity's current state forbids the operation
    #[error("{0}")]
    InvalidState(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    /// Bad request with message
    #[error("{0}")]
    BadRequest(String),

    /// The request deadline elapsed before a response was ready
    #[error("request timed out")]
    Timeout,

    /// Authentication and account errors carry their own codes
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::AlreadyExists(_) => "ALREADY_EXISTS",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Timeout => "TIMEOUT",
            ApiError::Auth(e) => e.code(),
            ApiError::Database(_) => "STORE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::InvalidState(_) | ApiError::InsufficientStock { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Auth(e) => e.status(),
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Auth(e) = self {
            return e.into_response();
        }

        let body = match &self {
            ApiError::Database(e) => {
                error!("Store failure: {}", e);
                json!({"error": "Database error", "code": self.code()})
            }
            ApiError::InsufficientStock {
                product_id,
                requested,
                available,
            } => json!({
                "error": self.to_string(),
                "code": self.code(),
                "product_id": product_id,
                "requested": requested,
                "available": available,
            }),
            _ => json!({"error": self.to_string(), "code": self.code()}),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
