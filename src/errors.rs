use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Business failures carry this code in the response envelope.
pub const BUSINESS_ERROR_CODE: i32 = -1;
/// Returned with HTTP 401 so the client redirects to sign-in.
pub const NO_AUTH_CODE: i32 = -2;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Invalid parameters")]
    InvalidParams,

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("Image generation error: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("Not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message shown to the client. Collaborator causes stay in the logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "no auth",
            AppError::EmailNotVerified => "Email not verified",
            AppError::Identity(_) => "Authentication failed",
            AppError::InvalidParams => "invalid params",
            AppError::InsufficientCredits => "credits not enough",
            AppError::Generation(_) => "generate wallpaper failed",
            AppError::Storage(_) => "upload image failed",
            AppError::Payment(_) => "handle order failed",
            AppError::NotFound => "not found",
            AppError::Database(_) | AppError::Internal(_) => "internal error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, NO_AUTH_CODE),
            AppError::EmailNotVerified => (StatusCode::FORBIDDEN, 403),
            AppError::Identity(ref cause) => {
                tracing::error!("Identity provider error: {}", cause);
                (StatusCode::INTERNAL_SERVER_ERROR, 500)
            }
            AppError::InvalidParams | AppError::InsufficientCredits | AppError::NotFound => {
                (StatusCode::OK, BUSINESS_ERROR_CODE)
            }
            AppError::Generation(ref cause) => {
                tracing::error!("Image generation error: {}", cause);
                (StatusCode::OK, BUSINESS_ERROR_CODE)
            }
            AppError::Storage(ref cause) => {
                tracing::error!("Storage error: {}", cause);
                (StatusCode::OK, BUSINESS_ERROR_CODE)
            }
            AppError::Payment(ref cause) => {
                tracing::error!("Payment error: {}", cause);
                (StatusCode::OK, BUSINESS_ERROR_CODE)
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::OK, BUSINESS_ERROR_CODE)
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::OK, BUSINESS_ERROR_CODE)
            }
        };

        let body = Json(json!({
            "code": code,
            "message": self.client_message(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
