use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{auth::jwt::TokenError, policy::PolicyError, users::repo::StoreError};

/// Every failure a handler can surface.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    Invalid(String),

    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// Role or self-target rule violated.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Missing, malformed, expired or forged credentials.
    #[error("{0}")]
    Unauthorized(String),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

pub const USER_NOT_FOUND: &str = "User not found";
pub const EMAIL_IN_USE: &str = "Email already in use";

impl AppError {
    pub fn user_not_found() -> Self {
        AppError::NotFound(USER_NOT_FOUND.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Invalid(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Internal(ref e) => {
                tracing::error!(error = %format!("{e:#}"), "internal error");
                "Server error".to_string()
            }
            AppError::Forbidden(ref msg) => {
                tracing::warn!(%msg, "forbidden");
                msg.clone()
            }
            AppError::Unauthorized(ref msg) => {
                tracing::warn!(%msg, "unauthorized");
                msg.clone()
            }
            AppError::Invalid(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg) => {
                tracing::debug!(%status, %msg, "request rejected");
                msg
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<PolicyError> for AppError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::Forbidden(msg) => AppError::Forbidden(msg),
            PolicyError::Invalid(msg) => AppError::Invalid(msg),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Misconfigured => {
                AppError::Internal(anyhow::anyhow!("jwt signing is not configured"))
            }
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AppError::Conflict(EMAIL_IN_USE.into()),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Invalid(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::Invalid("Invalid user ID".into())
    }
}
