use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::account::models::ConfirmResetCommand;
use crate::account::models::EmailAddress;
use crate::account::ports::IdentityOps;
use crate::inbound::http::router::AppState;

/// HTTP request body for completing a password reset (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    email: String,
    token: String,
    old_password: String,
    new_password: String,
    confirm_password: String,
}

pub async fn member_reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<ApiSuccess<ResetPasswordResponseData>, ApiError> {
    reset(state.users.as_ref(), body).await
}

pub async fn staff_reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<ApiSuccess<ResetPasswordResponseData>, ApiError> {
    reset(state.admins.as_ref(), body).await
}

async fn reset(
    ops: &dyn IdentityOps,
    body: ResetPasswordRequest,
) -> Result<ApiSuccess<ResetPasswordResponseData>, ApiError> {
    let email = EmailAddress::new(body.email).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let command = ConfirmResetCommand {
        email,
        token: body.token,
        old_password: body.old_password,
        new_password: body.new_password,
        confirm_password: body.confirm_password,
    };

    ops.confirm_password_reset(command)
        .await
        .map_err(ApiError::from)
        .map(|account| {
            ApiSuccess::new(
                StatusCode::OK,
                "Password updated. You can now log in.",
                ResetPasswordResponseData {
                    email: account.email.as_str().to_string(),
                },
            )
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetPasswordResponseData {
    pub email: String,
}
