use crate::services::{
    booking_service::BookingError,
    object_store::ObjectStoreError,
    storage_gateway::StorageError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::not_found("record not found"),
            other => AppError::internal(other.to_string()),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let status = match &err {
            BookingError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            BookingError::ItemNotFound(_)
            | BookingError::UserNotFound(_)
            | BookingError::RentalNotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Conflict { .. } => StatusCode::CONFLICT,
            BookingError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let status = match &err {
            StorageError::UnsupportedMediaType { .. } => StatusCode::BAD_REQUEST,
            StorageError::Init(_) | StorageError::UploadFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::new(status, err.to_string())
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(err: ObjectStoreError) -> Self {
        AppError::new(object_store_status(&err), err.to_string())
    }
}

fn object_store_status(err: &ObjectStoreError) -> StatusCode {
    match err {
        ObjectStoreError::BucketNotFound(_) | ObjectStoreError::ObjectNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        ObjectStoreError::InvalidBucketName { .. }
        | ObjectStoreError::InvalidObjectKey
        | ObjectStoreError::UnsupportedRegion(_) => StatusCode::BAD_REQUEST,
        ObjectStoreError::BucketAlreadyExists(_) => StatusCode::CONFLICT,
        ObjectStoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
