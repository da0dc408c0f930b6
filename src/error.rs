use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::config::Environment;

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Development mode adds the raw error to every envelope and stops masking
/// unexpected failures.
pub fn set_environment(env: Environment) {
    EXPOSE_DETAILS.store(env == Environment::Development, Ordering::Relaxed);
}

fn expose_details() -> bool {
    EXPOSE_DETAILS.load(Ordering::Relaxed)
}

/// Why a request could not be tied to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    NotLoggedIn,
    InvalidToken,
    ExpiredToken,
    PrincipalNotFound,
    CredentialsRotated,
}

impl AuthFailure {
    /// Only expiry is reported distinctly, so a client knows a refresh of the
    /// login is enough. Everything else collapses into one message.
    pub fn client_message(self) -> &'static str {
        match self {
            AuthFailure::NotLoggedIn => "You are not logged in! Please log in to get access.",
            AuthFailure::ExpiredToken => "Your token has expired! Please log in again.",
            AuthFailure::InvalidToken
            | AuthFailure::PrincipalNotFound
            | AuthFailure::CredentialsRotated => "Invalid token. Please log in again!",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("authentication failed: {0:?}")]
    Unauthenticated(AuthFailure),

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Your current password is wrong")]
    WrongCurrentPassword,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Token is invalid or has expired")]
    InvalidOrExpiredResetToken,

    /// Known failure of a collaborator (mail, payments) that we still report
    /// with its own message.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidOrExpiredResetToken => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated(_)
            | AppError::InvalidCredentials
            | AppError::WrongCurrentPassword => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operational errors are expected outcomes with a message safe to show.
    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Unauthenticated(failure) => failure.client_message().to_string(),
            AppError::Internal(err) if expose_details() => format!("{err:#}"),
            AppError::Internal(_) => "Something went very wrong!".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<AppError>() {
            Ok(app) => return app,
            Err(other) => other,
        };
        match err.downcast::<sqlx::Error>() {
            Ok(db_err) => db_err.into(),
            Err(other) => AppError::Internal(other),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("No document found with that ID".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                "Duplicate field value. Please use another value!".into(),
            ),
            _ => AppError::Internal(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if !self.is_operational() {
            error!(error = ?self, "unexpected error");
        }

        let kind = if status.is_client_error() { "fail" } else { "error" };
        let mut body = json!({
            "status": kind,
            "message": self.client_message(),
        });
        if expose_details() {
            body["error"] = json!(format!("{self:?}"));
        }

        (status, Json(body)).into_response()
    }
}
