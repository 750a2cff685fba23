use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::account::models::EmailAddress;
use crate::account::ports::IdentityOps;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResendVerificationRequest {
    email: String,
}

pub async fn member_resend_verification(
    State(state): State<AppState>,
    Json(body): Json<ResendVerificationRequest>,
) -> Result<ApiSuccess<ResendVerificationResponseData>, ApiError> {
    resend(state.users.as_ref(), body).await
}

pub async fn staff_resend_verification(
    State(state): State<AppState>,
    Json(body): Json<ResendVerificationRequest>,
) -> Result<ApiSuccess<ResendVerificationResponseData>, ApiError> {
    resend(state.admins.as_ref(), body).await
}

async fn resend(
    ops: &dyn IdentityOps,
    body: ResendVerificationRequest,
) -> Result<ApiSuccess<ResendVerificationResponseData>, ApiError> {
    let email = EmailAddress::new(body.email).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    ops.resend_verification(&email)
        .await
        .map_err(ApiError::from)
        .map(|account| {
            ApiSuccess::new(
                StatusCode::OK,
                "Verification email sent.",
                ResendVerificationResponseData {
                    email: account.email.as_str().to_string(),
                },
            )
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResendVerificationResponseData {
    pub email: String,
}
