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
pub struct ForgotPasswordRequest {
    email: String,
}

pub async fn member_forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<ApiSuccess<ForgotPasswordResponseData>, ApiError> {
    forgot(state.users.as_ref(), body).await
}

pub async fn staff_forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<ApiSuccess<ForgotPasswordResponseData>, ApiError> {
    forgot(state.admins.as_ref(), body).await
}

async fn forgot(
    ops: &dyn IdentityOps,
    body: ForgotPasswordRequest,
) -> Result<ApiSuccess<ForgotPasswordResponseData>, ApiError> {
    let email = EmailAddress::new(body.email).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    ops.request_password_reset(&email)
        .await
        .map_err(ApiError::from)
        .map(|account| {
            ApiSuccess::new(
                StatusCode::OK,
                "Password reset email sent.",
                ForgotPasswordResponseData {
                    email: account.email.as_str().to_string(),
                },
            )
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForgotPasswordResponseData {
    pub email: String,
}
