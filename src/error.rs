use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    // Rejected before any store mutation.
    #[error("{0}")]
    Validation(String),

    #[error("duplicate image name: {0}")]
    DuplicateName(String),

    #[error("{0} not found")]
    NotFound(String),

    // --- Account errors ---
    #[error("username {0} is already taken")]
    UsernameTaken(String),

    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    // --- Store & consistency errors ---
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The object store and the record store diverged mid-operation: an
    /// object mutation succeeded but the record write failed, or the
    /// record still references bytes that are gone. Never retried
    /// automatically; the lifecycle logs the keys involved before this
    /// surfaces.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    // --- Internal errors ---
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("generating response for AppError: {:?}", self);

        let (status_code, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::DuplicateName(_) => (
                StatusCode::CONFLICT,
                "Duplicate image name found. Please choose a different name.".to_string(),
            ),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::UsernameTaken(_) | Self::EmailTaken(_) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Store(err) if err.is_retryable() => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            Self::Store(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            Self::Inconsistent(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Multipart(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "an internal server error occurred".to_string(),
            ),
        };

        (status_code, Json(json!({ "message": message }))).into_response()
    }
}
