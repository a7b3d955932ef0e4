use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No user row, or the user has no password (OAuth-only).
    #[error("user not found")]
    UserNotFound,

    #[error("incorrect password")]
    InvalidPassword,

    #[error("email not verified")]
    EmailNotVerified,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("oauth account is not linked to the existing user")]
    AccountNotLinked,

    #[error("oauth error: {0}")]
    OAuth(String),

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated
            | AppError::UserNotFound
            | AppError::InvalidPassword => StatusCode::UNAUTHORIZED,
            AppError::EmailNotVerified => StatusCode::FORBIDDEN,
            AppError::MissingInput(_) | AppError::InvalidInput(_) | AppError::InvalidToken => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::AccountNotLinked => StatusCode::CONFLICT,
            AppError::OAuth(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for clients. Credential failures share one code so
    /// callers cannot tell an unknown email from a wrong password.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "Unauthenticated",
            AppError::MissingInput(_) => "MissingInput",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::UserNotFound | AppError::InvalidPassword => "CredentialsSignin",
            AppError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::InvalidToken => "InvalidToken",
            AppError::AccountNotLinked => "OAuthAccountNotLinked",
            AppError::OAuth(_) => "OAuthCallback",
            AppError::Storage(_) => "StorageFailure",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::UserNotFound | AppError::InvalidPassword => "Invalid credentials".into(),
            AppError::Storage(_) => "Internal server error".into(),
            AppError::OAuth(_) => "Sign-in with the external provider failed".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Storage(e) = &self {
            error!(error = %e, "storage failure");
        }
        let body = json!({
            "error": self.code(),
            "message": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}
