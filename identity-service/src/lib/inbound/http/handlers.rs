use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use crate::account::errors::IdentityError;

pub mod forgot_password;
pub mod login;
pub mod logout;
pub mod resend_verification;
pub mod reset_password;
pub mod signup;
pub mod verify_email;

/// Uniform response envelope.
///
/// Every response, success or failure, carries the same shape: timestamp,
/// success flag, data object, human-readable message, and the HTTP status
/// repeated in the body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponseBody<T: Serialize> {
    time_stamp: DateTime<Utc>,
    success: bool,
    data: T,
    message: String,
    status: u16,
}

impl<T: Serialize> ApiResponseBody<T> {
    pub fn new(status: StatusCode, message: String, data: T) -> Self {
        Self {
            time_stamp: Utc::now(),
            success: status.is_success(),
            data,
            message,
            status: status.as_u16(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize>(StatusCode, Json<ApiResponseBody<T>>);

impl<T: Serialize> ApiSuccess<T> {
    pub fn new(status: StatusCode, message: &str, data: T) -> Self {
        ApiSuccess(
            status,
            Json(ApiResponseBody::new(status, message.to_string(), data)),
        )
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::InternalServerError(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (
            status,
            Json(ApiResponseBody::new(status, message, serde_json::json!({}))),
        )
            .into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidAccountId(_)
            | IdentityError::InvalidEmail(_)
            | IdentityError::InvalidMobile(_)
            | IdentityError::WeakPassword(_)
            | IdentityError::PasswordConfirmationMismatch
            | IdentityError::PasswordRequired
            | IdentityError::PasswordNotAccepted
            | IdentityError::DesignationRequired
            | IdentityError::PasswordUnchanged
            | IdentityError::OldPasswordMismatch => ApiError::BadRequest(err.to_string()),
            IdentityError::NotFound(_) => ApiError::NotFound(err.to_string()),
            IdentityError::EmailAlreadyRegistered(_) | IdentityError::MobileAlreadyRegistered(_) => {
                ApiError::Conflict(err.to_string())
            }
            IdentityError::EmailTakenByOtherRole
            | IdentityError::InvalidToken
            | IdentityError::AlreadyVerified
            | IdentityError::PasswordNotSet
            | IdentityError::PasswordChangeRequired
            | IdentityError::AccountDisabled
            | IdentityError::AccountLocked => ApiError::Forbidden(err.to_string()),
            IdentityError::EmailNotVerified | IdentityError::InvalidCredentials => {
                ApiError::Unauthorized(err.to_string())
            }
            IdentityError::Password(_)
            | IdentityError::SessionToken(_)
            | IdentityError::DatabaseError(_)
            | IdentityError::Unknown(_) => {
                // Internals stay in the log; the caller gets a generic line.
                tracing::error!("Identity operation failed: {}", err);
                ApiError::InternalServerError(
                    "Something went wrong, please try again later".to_string(),
                )
            }
        }
    }
}
