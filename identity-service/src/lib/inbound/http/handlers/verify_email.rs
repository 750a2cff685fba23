use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::account::models::Account;
use crate::account::models::EmailAddress;
use crate::account::ports::IdentityOps;
use crate::inbound::http::router::AppState;

/// Query parameters of the emailed verification link.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifyEmailParams {
    email: String,
    token: String,
}

pub async fn member_verify_email(
    State(state): State<AppState>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<ApiSuccess<VerifyEmailResponseData>, ApiError> {
    verify(state.users.as_ref(), params).await
}

pub async fn staff_verify_email(
    State(state): State<AppState>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<ApiSuccess<VerifyEmailResponseData>, ApiError> {
    verify(state.admins.as_ref(), params).await
}

async fn verify(
    ops: &dyn IdentityOps,
    params: VerifyEmailParams,
) -> Result<ApiSuccess<VerifyEmailResponseData>, ApiError> {
    // A malformed email cannot match any stored token; answer as one.
    let email = EmailAddress::new(params.email)
        .map_err(|_| ApiError::Forbidden("Invalid or expired token".to_string()))?;

    ops.verify_email(&email, &params.token)
        .await
        .map_err(ApiError::from)
        .map(|ref account| {
            ApiSuccess::new(StatusCode::OK, "Email verified successfully.", account.into())
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailResponseData {
    pub email: String,
    pub is_email_verified: bool,
}

impl From<&Account> for VerifyEmailResponseData {
    fn from(account: &Account) -> Self {
        Self {
            email: account.email.as_str().to_string(),
            is_email_verified: account.is_email_verified,
        }
    }
}
